pub mod append_segment_use_case;
pub mod infrastructure;
pub mod pipeline_driver;
pub mod pipeline_logger;

#[cfg(test)]
pub(crate) mod test_support;

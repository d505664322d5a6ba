mod glyphs;
pub mod label_annotator;

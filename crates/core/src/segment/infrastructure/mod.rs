pub mod directory_scanner;

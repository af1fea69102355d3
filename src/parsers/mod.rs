mod dense_capsuled_parser;

pub use self::dense_capsuled_parser::DenseScanDecoder;

pub mod product_reader;

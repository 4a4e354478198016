pub mod collations;
pub mod config;
pub mod packet_printer;

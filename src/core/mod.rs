//! Low-level XML scanning: byte scanner, pull tokenizer, attribute parsing,
//! entity decoding.

pub mod attributes;
pub mod entities;
pub mod scanner;
pub mod tokenizer;

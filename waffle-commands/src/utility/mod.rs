pub mod rep;

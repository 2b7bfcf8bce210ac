pub mod get_ready;

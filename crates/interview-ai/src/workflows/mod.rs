pub mod telephonic;

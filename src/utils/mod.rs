//! Utility functions and types

pub mod data_loader;
pub mod io;

pub use data_loader::{
    column_names, column_to_vec, column_values, columns_to_array2, drop_column_if_present,
    has_column, train_test_split, DataLoader, DataSaver,
};
pub use io::{copy_file, ensure_parent_dir, load_object, read_yaml, save_object, write_yaml};

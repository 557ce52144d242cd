pub mod audio;
pub mod leads;

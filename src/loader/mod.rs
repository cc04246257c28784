pub mod sample_loader;

pub use sample_loader::{LoadError, index_wav_in_dir, load_wav, scan_dir};

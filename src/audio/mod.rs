pub mod buffer;
pub mod decode;
pub mod loudness;
pub mod resample;
pub mod wav;

pub mod control;
pub mod converter;
pub mod error;
pub mod policy;
pub mod rcm;
pub mod settings;
pub mod smf;
pub mod sysex;

pub use converter::Converter;
pub use error::Error;
pub use settings::Settings;

pub mod card;
pub mod detector;
pub mod rows;

pub use card::{CardLayout, CardSide};
pub use detector::{find_data_regions, LineDetector, MorphologyDetector, Orientation};

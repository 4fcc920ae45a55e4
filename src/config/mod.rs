pub mod load;
pub mod locate;
pub mod model;

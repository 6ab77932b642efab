pub mod company;
pub mod contacts;
pub mod description;
pub mod location;
pub mod position;
pub mod salary;

pub mod calendar;
pub mod config;
pub mod constraints;
pub mod fatigue;
pub mod forecast;
pub mod generator;
pub mod master;
pub mod model;
pub mod report;
pub mod solver;
pub mod validator;

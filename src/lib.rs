pub mod composer;
pub mod controllers;
pub mod models;
pub mod repositories;
pub mod services;

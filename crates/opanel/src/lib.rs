pub mod ui;
pub mod web;

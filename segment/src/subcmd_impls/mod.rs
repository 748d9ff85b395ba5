pub mod args;
mod combine;
mod labels;
mod panels;
mod run;
mod utils;

//! Trigger handlers, grouped by area. Each file extends [`super::Engine`].

mod admin;
mod flows;
mod menu;

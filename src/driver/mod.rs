//! Browser driver abstraction.
//!
//! Scenarios and the availability probe talk to pages through
//! [`PageDriver`]; two backends implement it:
//! - [`chrome`] drives Chrome/Chromium over the DevTools protocol
//! - [`mock`] is a scripted in-memory page for tests

pub mod chrome;
pub mod mock;
pub mod types;

pub use chrome::{ChromeBrowser, ChromeLauncher, ChromeOptions, ChromePage};
pub use mock::{MockBrowser, MockEffect, MockLauncher, MockPage};
pub use types::{
    BrowserDriver, BrowserLauncher, Download, DownloadWatch, DriverError, DriverResult,
    ElementState, PageDriver,
};

mod application;
mod billing;
mod common;
mod routing;
mod webhook;

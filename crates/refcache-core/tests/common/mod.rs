#![allow(dead_code)]

pub mod ref_server;

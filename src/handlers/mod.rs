//! HTTP handlers for generated resource routes.

pub mod resource;

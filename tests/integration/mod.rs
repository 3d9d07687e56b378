//! Integration tests for the filesystem index

mod ingest;
mod metadata;
mod os_filesystem;
mod support;
mod tags;

//! Unit tests for the downloader core, split by topic

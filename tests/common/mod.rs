#![allow(dead_code)]

pub mod fake_exec;
pub mod fixtures;
pub mod mock_aws;
pub mod mock_k8s;
pub mod mock_stacks;

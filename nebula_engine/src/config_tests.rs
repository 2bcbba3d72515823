//! Unit tests for config.rs

use crate::config::Config;
use crate::descriptor::PoolSizeRatio;
use crate::error::Error;
use crate::graphics_device::{DescriptorType, PresentMode};
use std::time::Duration;

#[test]
fn test_default_values() {
    let config = Config::default();
    assert_eq!(config.window_width, 1700);
    assert_eq!(config.window_height, 900);
    assert_eq!(config.present_mode, PresentMode::Fifo);
    assert_eq!(config.fence_timeout_ns, u64::MAX);
    assert_eq!(config.minimized_poll_interval, Duration::from_millis(100));
    assert_eq!(config.frame_descriptor_sets, 1000);
    assert_eq!(config.frame_descriptor_ratios.len(), 4);
    assert_eq!(config.global_descriptor_sets, 10);
}

#[test]
fn test_default_validates() {
    assert!(Config::default().validate().is_ok());
}

#[test]
fn test_window_extent() {
    let config = Config {
        window_width: 640,
        window_height: 480,
        ..Default::default()
    };
    let extent = config.window_extent();
    assert_eq!((extent.width, extent.height), (640, 480));
}

#[test]
fn test_zero_window_rejected() {
    let config = Config {
        window_height: 0,
        ..Default::default()
    };
    assert!(matches!(config.validate(), Err(Error::InitializationFailed(_))));
}

#[test]
fn test_zero_set_counts_rejected() {
    let frame = Config { frame_descriptor_sets: 0, ..Default::default() };
    let global = Config { global_descriptor_sets: 0, ..Default::default() };
    assert!(frame.validate().is_err());
    assert!(global.validate().is_err());
}

#[test]
fn test_non_positive_ratio_rejected() {
    let mut config = Config::default();
    config.global_descriptor_ratios.push(PoolSizeRatio::new(DescriptorType::StorageBuffer, 0.0));
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.frame_descriptor_ratios[0].ratio = f32::NAN;
    assert!(config.validate().is_err());
}

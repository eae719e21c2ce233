//! 音频播放测试
//!
//! 在默认输出设备上播放一个 WAV/MP3 文件
//!
//! 运行: cargo run --example play_clip -- <文件路径>

use std::time::{Duration, Instant};

use viboard_lib::audio::{CpalBackend, DeviceWatcher, PlaybackSessionManager, SoundAsset};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let path = std::env::args()
        .nth(1)
        .ok_or("usage: play_clip <file>")?;

    println!("=== 音频播放测试 ===\n");

    let mut session = PlaybackSessionManager::new(Box::new(CpalBackend::new()));
    let mut watcher = DeviceWatcher::new(1);
    for event in watcher.poll(session.backend_mut()) {
        session.handle_device_event(event);
    }

    // 列出可用设备
    println!("可用输出设备:");
    for (i, device) in session.devices().iter().enumerate() {
        println!("  {}: {}", i, device.name);
    }
    println!();

    let clip = SoundAsset::load(&path)?;
    println!(
        "{}: {} Hz, {} 声道, {} 个样本\n",
        clip.name(),
        clip.format().sample_rate,
        clip.format().channels,
        clip.sample_count()
    );

    let report = session.play(&clip, false);
    for (slot, e) in &report.failures {
        println!("槽位 {} 播放失败: {}", slot, e);
    }
    if report.played.is_empty() {
        return Ok(());
    }

    let start = Instant::now();
    while session.is_active() && start.elapsed() < Duration::from_secs(30) {
        std::thread::sleep(Duration::from_millis(10));
    }

    println!("播放完成，用时 {:.2} 秒", start.elapsed().as_secs_f32());
    Ok(())
}

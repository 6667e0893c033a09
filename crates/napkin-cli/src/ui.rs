//! UI utilities for Napkin CLI.

use std::time::Duration;

const BOX_WIDTH: usize = 48;

/// A formatted box for displaying the session URL.
pub struct SessionBox<'a> {
    url: &'a str,
    expire: Option<Duration>,
    qr: bool,
}

impl<'a> SessionBox<'a> {
    /// Create a new session box.
    #[must_use]
    pub const fn new(url: &'a str) -> Self {
        Self {
            url,
            expire: None,
            qr: false,
        }
    }

    /// Add the session timeout to the box.
    #[must_use]
    pub const fn with_expire(mut self, expire: Duration) -> Self {
        self.expire = Some(expire);
        self
    }

    /// Print a QR code of the URL above the box.
    #[must_use]
    pub const fn with_qr(mut self, show: bool) -> Self {
        self.qr = show;
        self
    }

    /// Display the box to stdout.
    pub fn display(&self) {
        if self.qr {
            match napkin_core::qr::generate_ascii(self.url) {
                Ok(code) => {
                    for line in code.lines() {
                        println!("  {}", line);
                    }
                    println!();
                }
                Err(e) => tracing::warn!("Could not render QR code: {}", e),
            }
        }

        println!("  ┌{}┐", "─".repeat(BOX_WIDTH));
        println!("  │{}│", center_in_box("Open on your phone:", BOX_WIDTH));
        println!("  │{}│", center_in_box(self.url, BOX_WIDTH));

        if let Some(expire) = self.expire {
            let expire_line = format!("Closes in {}", format_remaining(expire));
            println!("  │{}│", " ".repeat(BOX_WIDTH));
            println!("  │{}│", center_in_box(&expire_line, BOX_WIDTH));
        }

        println!("  └{}┘", "─".repeat(BOX_WIDTH));
    }
}

fn center_in_box(content: &str, width: usize) -> String {
    let content_len = content.chars().count();
    let padding = width.saturating_sub(content_len);
    let left = padding / 2;
    let right = padding - left;
    format!("{}{}{}", " ".repeat(left), content, " ".repeat(right))
}

/// Format remaining duration as "M:SS".
pub fn format_remaining(remaining: Duration) -> String {
    let total_secs = remaining.as_secs();
    let mins = total_secs / 60;
    let secs = total_secs % 60;
    format!("{}:{:02}", mins, secs)
}

/// Format a byte count for humans.
pub fn format_size(bytes: usize) -> String {
    const KIB: f64 = 1024.0;
    #[allow(clippy::cast_precision_loss)]
    let value = bytes as f64;
    if value < KIB {
        format!("{} B", bytes)
    } else if value < KIB * KIB {
        format!("{:.1} KiB", value / KIB)
    } else {
        format!("{:.1} MiB", value / (KIB * KIB))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_center_in_box() {
        let centered = center_in_box("hello", 11);
        assert_eq!(centered, "   hello   ");

        let centered = center_in_box("hi", 6);
        assert_eq!(centered, "  hi  ");
    }

    #[test]
    fn test_center_in_box_overflow() {
        let long = "http://192.168.100.200:8080/?token=0123456789abcdef0123456789abcdef";
        assert_eq!(center_in_box(long, BOX_WIDTH), long);
    }

    #[test]
    fn test_format_remaining() {
        assert_eq!(format_remaining(Duration::from_secs(300)), "5:00");
        assert_eq!(format_remaining(Duration::from_secs(65)), "1:05");
        assert_eq!(format_remaining(Duration::from_secs(0)), "0:00");
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.0 KiB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.0 MiB");
    }
}

//! Window placement across monitors

/// Position and current video mode size of one monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorInfo {
    /// Virtual screen x of the monitor's top-left corner
    pub x: i32,
    /// Virtual screen y of the monitor's top-left corner
    pub y: i32,
    /// Video mode width
    pub width: u32,
    /// Video mode height
    pub height: u32,
}

/// Index of the monitor a window at `window_x` opened on: the closest
/// monitor whose left edge is not right of the window, else the first
pub fn monitor_under(monitors: &[MonitorInfo], window_x: i32) -> usize {
    monitors
        .iter()
        .enumerate()
        .filter(|(_, m)| m.x <= window_x)
        .min_by_key(|(_, m)| window_x - m.x)
        .map_or(0, |(i, _)| i)
}

/// Where to put a `window_size` window that the system placed at `window_pos`
/// so that it ends up on monitor `target`.
///
/// An out of range target means monitor 0. Centring puts the window's centre
/// on the target's video mode centre; otherwise the window keeps its offset
/// from the monitor it opened on. With no monitors the position is unchanged.
pub fn compute_window_position(
    monitors: &[MonitorInfo],
    target: usize,
    window_pos: (i32, i32),
    window_size: (u32, u32),
    center: bool,
) -> (i32, i32) {
    let Some(first) = monitors.first() else {
        return window_pos;
    };
    let target = monitors.get(target).unwrap_or(first);

    let (local_x, local_y) = if center {
        (
            half(target.width) - half(window_size.0),
            half(target.height) - half(window_size.1),
        )
    } else {
        let current = &monitors[monitor_under(monitors, window_pos.0)];
        (window_pos.0 - current.x, window_pos.1 - current.y)
    };

    (local_x + target.x, local_y + target.y)
}

fn half(value: u32) -> i32 {
    i32::try_from(value / 2).unwrap_or(i32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monitors() -> Vec<MonitorInfo> {
        vec![
            MonitorInfo { x: 0, y: 0, width: 1920, height: 1080 },
            MonitorInfo { x: 1920, y: 0, width: 2560, height: 1440 },
        ]
    }

    #[test]
    fn test_center_on_primary() {
        let pos = compute_window_position(&monitors(), 0, (100, 100), (1280, 720), true);
        assert_eq!(pos, (320, 180));
    }

    #[test]
    fn test_center_on_second_monitor() {
        let pos = compute_window_position(&monitors(), 1, (100, 100), (1280, 720), true);
        assert_eq!(pos, (1920 + 640, 360));
    }

    #[test]
    fn test_bad_index_means_first_monitor() {
        let pos = compute_window_position(&monitors(), 7, (100, 100), (1280, 720), true);
        assert_eq!(pos, (320, 180));
    }

    #[test]
    fn test_keep_offset_when_moving_monitors() {
        // opened 50,60 into the second monitor, moved to the first
        let pos = compute_window_position(&monitors(), 0, (1970, 60), (800, 600), false);
        assert_eq!(pos, (50, 60));

        // opened on the first, moved to the second
        let pos = compute_window_position(&monitors(), 1, (50, 60), (800, 600), false);
        assert_eq!(pos, (1970, 60));
    }

    #[test]
    fn test_monitor_under() {
        let m = monitors();
        assert_eq!(monitor_under(&m, 0), 0);
        assert_eq!(monitor_under(&m, 1919), 0);
        assert_eq!(monitor_under(&m, 1920), 1);
        // left of every monitor
        assert_eq!(monitor_under(&m, -50), 0);
    }

    #[test]
    fn test_no_monitors_keeps_position() {
        assert_eq!(compute_window_position(&[], 0, (10, 20), (800, 600), true), (10, 20));
    }
}

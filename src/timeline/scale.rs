use super::Viewport;

/// Candidate minor tick spacings, in microseconds (1µs to 1s)
const INCREMENTS_US: [u64; 19] = [
    1, 2, 5, 10, 20, 50, 100, 200, 500, 1_000, 2_000, 5_000, 10_000, 20_000, 50_000, 100_000,
    200_000, 500_000, 1_000_000,
];

const NANOS_PER_SEC: u64 = 1_000_000_000;

#[derive(Debug, Clone, PartialEq)]
pub struct Tick {
    pub x: f64,
    pub time: u64,
    pub label: String,
    /// Whole seconds
    pub major: bool,
}

/// Increment whose on-screen spacing is closest to `min_gap`
fn closest_increment(zoom: f64, min_gap: f64) -> u64 {
    let target = min_gap / (1_000.0 * zoom);
    INCREMENTS_US
        .into_iter()
        .min_by(|a, b| {
            let da = (*a as f64 - target).abs();
            let db = (*b as f64 - target).abs();
            da.total_cmp(&db)
        })
        .unwrap_or(1_000_000)
}

fn millis_label(micros: u64) -> String {
    if micros % 1_000 == 0 {
        format!("{} ms", micros / 1_000)
    } else {
        let text = format!("{:.3}", micros as f64 / 1_000.0);
        format!("{} ms", text.trim_end_matches('0'))
    }
}

/// Axis ticks for the visible window: every whole second plus minor ticks
/// spaced roughly `min_gap` apart
pub fn ticks(viewport: &Viewport, min_gap: f64) -> Vec<Tick> {
    let zoom = viewport.zoom();
    if zoom <= 0.0 || viewport.width() <= 0.0 {
        return Vec::new();
    }

    let start_ns = (-viewport.pan_x() / zoom).max(0.0);
    let end_ns = start_ns + viewport.width() / zoom;
    let mut ticks = Vec::new();

    let first_sec = (start_ns / NANOS_PER_SEC as f64).ceil() as u64;
    let last_sec = (end_ns / NANOS_PER_SEC as f64).floor() as u64;
    for sec in first_sec..=last_sec {
        let time = sec * NANOS_PER_SEC;
        ticks.push(Tick {
            x: viewport.time_to_x(time),
            time,
            label: format!("{:.1}s", sec as f64),
            major: true,
        });
    }

    let increment = closest_increment(zoom, min_gap);
    let start_us = start_ns / 1_000.0;
    let end_us = end_ns / 1_000.0;
    let mut micros = (start_us / 1_000_000.0).floor() as u64 * 1_000_000;
    while (micros as f64) < end_us {
        micros += increment;
        if micros % 1_000_000 != 0 && micros as f64 >= start_us && (micros as f64) <= end_us {
            let time = micros * 1_000;
            ticks.push(Tick {
                x: viewport.time_to_x(time),
                time,
                label: millis_label(micros),
                major: false,
            });
        }
    }

    ticks.sort_by_key(|t| t.time);
    ticks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_increment_tracks_zoom() {
        // 1px per µs: a 100px gap wants 100µs ticks
        assert_eq!(closest_increment(0.001, 100.0), 100);
        assert_eq!(closest_increment(1.0, 100.0), 1);
        assert_eq!(closest_increment(1e-9, 100.0), 1_000_000);
    }

    #[test]
    fn test_millis_label() {
        assert_eq!(millis_label(2_000), "2 ms");
        assert_eq!(millis_label(500), "0.5 ms");
        assert_eq!(millis_label(1_250), "1.25 ms");
    }

    #[test]
    fn test_ticks_within_window() {
        let mut vp = Viewport::new(2_000_000_000, 3, 1.0, 1_000);
        vp.resize(200.0, 10.0);

        let ticks = ticks(&vp, 20.0);
        assert!(!ticks.is_empty());
        assert!(ticks.iter().all(|t| t.x >= -1e-6 && t.x <= 200.0 + 1e-6));
        assert!(ticks.iter().any(|t| t.major && t.label == "1.0s"));
        for pair in ticks.windows(2) {
            assert!(pair[0].time < pair[1].time);
        }
    }
}

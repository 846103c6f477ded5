use tokio::time::Instant;

/// Anchor-and-elapsed clock for a media position.
///
/// The position is `anchor_position` plus the time elapsed since
/// `anchor_instant` while running. Uses tokio's `Instant` so tests can
/// drive it with paused time.
#[derive(Debug, PartialEq, Default)]
pub struct PlaybackTimer {
    anchor_position: f64,
    /// Set while the clock runs.
    anchor_instant: Option<Instant>,
}

impl PlaybackTimer {
    /// Stop the clock and move it to `position`.
    pub fn reset(&mut self, position: f64) {
        self.anchor_position = sanitize_position(position);
        self.anchor_instant = None;
    }

    /// Move to `position` without changing whether the clock runs.
    pub fn set_position(&mut self, position: f64) {
        self.anchor_position = sanitize_position(position);
        if self.anchor_instant.is_some() {
            self.anchor_instant = Some(Instant::now());
        }
    }

    pub fn mark_playing(&mut self) {
        if self.anchor_instant.is_none() {
            self.anchor_instant = Some(Instant::now());
        }
    }

    /// Freeze the clock at its current estimate so paused wall time is
    /// never counted after a resume.
    pub fn mark_paused(&mut self) {
        self.anchor_position = self.estimate();
        self.anchor_instant = None;
    }

    pub fn is_running(&self) -> bool {
        self.anchor_instant.is_some()
    }

    pub fn estimate(&self) -> f64 {
        let base = self.anchor_position;
        match self.anchor_instant {
            Some(inst) => {
                let val = base + inst.elapsed().as_secs_f64();
                if val.is_finite() { val } else { base }
            }
            None => base,
        }
    }
}

pub fn sanitize_position(p: f64) -> f64 {
    if p.is_nan() || !p.is_finite() || p < 0.0 {
        0.0
    } else {
        p
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn estimate_advances_only_while_running() {
        let mut t = PlaybackTimer::default();
        t.reset(10.0);
        tokio::time::advance(Duration::from_secs(3)).await;
        assert_eq!(t.estimate(), 10.0);

        t.mark_playing();
        tokio::time::advance(Duration::from_millis(1500)).await;
        assert!((t.estimate() - 11.5).abs() < 1e-6);

        t.mark_paused();
        tokio::time::advance(Duration::from_secs(5)).await;
        assert!((t.estimate() - 11.5).abs() < 1e-6);
    }

    #[tokio::test(start_paused = true)]
    async fn set_position_re_anchors_a_running_clock() {
        let mut t = PlaybackTimer::default();
        t.mark_playing();
        tokio::time::advance(Duration::from_secs(2)).await;
        t.set_position(40.0);
        tokio::time::advance(Duration::from_secs(1)).await;
        assert!((t.estimate() - 41.0).abs() < 1e-6);
    }

    #[test]
    fn sanitize_rejects_junk() {
        assert_eq!(sanitize_position(f64::NAN), 0.0);
        assert_eq!(sanitize_position(f64::INFINITY), 0.0);
        assert_eq!(sanitize_position(-2.0), 0.0);
        assert_eq!(sanitize_position(2.5), 2.5);
    }
}

//! Device classification and the workload profile derived from it.
//!
//! A single `reduced` flag is decided from viewport width and user agent, then
//! expanded into a [`QualityProfile`] that is threaded into every generator at
//! mount time. Changing the flag regenerates geometry; nothing resamples in
//! place.

use regex::Regex;
use serde::Serialize;

/// Viewports narrower than this are treated as constrained devices.
pub const MOBILE_BREAKPOINT: u32 = 768;

/// Case-insensitive user-agent pattern for mobile browsers.
pub const MOBILE_USER_AGENT: &str = r"(?i)Android|webOS|iPhone|iPad|iPod|BlackBerry|IEMobile|Opera Mini";

/// Decides the reduced-quality flag.
#[derive(Debug, Clone)]
pub struct DeviceClassifier {
    breakpoint: u32,
    user_agent: Regex,
}

impl DeviceClassifier {
    pub fn new(breakpoint: u32, user_agent_pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            breakpoint,
            user_agent: Regex::new(user_agent_pattern)?,
        })
    }

    /// `width < breakpoint || user agent looks mobile`.
    pub fn classify(&self, viewport_width: u32, user_agent: &str) -> bool {
        viewport_width < self.breakpoint || self.user_agent.is_match(user_agent)
    }
}

impl Default for DeviceClassifier {
    fn default() -> Self {
        Self::new(MOBILE_BREAKPOINT, MOBILE_USER_AGENT).expect("built-in user agent pattern is valid")
    }
}

/// Classify with the default breakpoint and pattern.
pub fn classify(viewport_width: u32, user_agent: &str) -> bool {
    DeviceClassifier::default().classify(viewport_width, user_agent)
}

/// Perspective camera placement and orbit limits.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraConfig {
    pub fov_degrees: f32,
    pub position: [f32; 3],
    pub min_distance: f32,
    pub max_distance: f32,
}

/// What a two-finger gesture does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum TwoFingerGesture {
    Pan,
    DollyZoom,
}

/// Orbit-control mapping handed to the host.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionConfig {
    pub enable_rotate: bool,
    pub enable_zoom: bool,
    pub enable_pan: bool,
    pub rotate_speed: f32,
    pub two_finger: TwoFingerGesture,
}

/// Every count and subdivision that depends on the quality flag.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityProfile {
    pub reduced: bool,
    pub energy_points: usize,
    pub neuron_count: usize,
    pub perception_particles: usize,
    /// Width/height subdivisions for spheres.
    pub sphere_segments: u32,
    pub torus_radial_segments: u32,
    pub torus_tubular_segments: u32,
    pub stream_radial_segments: u32,
    pub secondary_light: bool,
    pub camera: CameraConfig,
    pub interaction: InteractionConfig,
}

impl QualityProfile {
    pub fn full() -> Self {
        Self {
            reduced: false,
            energy_points: 2000,
            neuron_count: 500,
            perception_particles: 1000,
            sphere_segments: 32,
            torus_radial_segments: 8,
            torus_tubular_segments: 32,
            stream_radial_segments: 8,
            secondary_light: true,
            camera: CameraConfig {
                fov_degrees: 50.0,
                position: [0.0, 0.0, 10.0],
                min_distance: 5.0,
                max_distance: 50.0,
            },
            interaction: InteractionConfig {
                enable_rotate: true,
                enable_zoom: true,
                enable_pan: true,
                rotate_speed: 1.0,
                two_finger: TwoFingerGesture::Pan,
            },
        }
    }

    pub fn reduced() -> Self {
        Self {
            reduced: true,
            energy_points: 800,
            neuron_count: 250,
            perception_particles: 500,
            sphere_segments: 16,
            torus_radial_segments: 4,
            torus_tubular_segments: 16,
            stream_radial_segments: 4,
            secondary_light: false,
            camera: CameraConfig {
                fov_degrees: 60.0,
                position: [0.0, 0.0, 14.0],
                min_distance: 8.0,
                max_distance: 30.0,
            },
            interaction: InteractionConfig {
                enable_rotate: true,
                enable_zoom: true,
                enable_pan: false,
                rotate_speed: 0.6,
                two_finger: TwoFingerGesture::DollyZoom,
            },
        }
    }

    pub fn for_flag(reduced: bool) -> Self {
        if reduced {
            Self::reduced()
        } else {
            Self::full()
        }
    }
}

impl Default for QualityProfile {
    fn default() -> Self {
        Self::full()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DESKTOP: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 Chrome/120.0 Safari/537.36";
    const PHONE: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) AppleWebKit/605.1.15";

    #[test]
    fn test_width_breakpoint() {
        assert!(classify(767, DESKTOP));
        assert!(!classify(768, DESKTOP));
        assert!(!classify(1920, DESKTOP));
    }

    #[test]
    fn test_mobile_user_agent() {
        assert!(classify(1920, PHONE));
        assert!(classify(1920, "some opera mini build"));
        assert!(classify(2048, "Mozilla/5.0 (Linux; ANDROID 14)"));
    }

    #[test]
    fn test_custom_classifier() {
        let classifier = DeviceClassifier::new(1024, "Kiosk").unwrap();
        assert!(classifier.classify(800, DESKTOP));
        assert!(classifier.classify(1280, "Kiosk/1.0"));
        assert!(!classifier.classify(1280, PHONE));
        assert!(DeviceClassifier::new(768, "(").is_err());
    }

    #[test]
    fn test_reduced_profile_halves_brain_work() {
        let full = QualityProfile::full();
        let reduced = QualityProfile::reduced();
        assert_eq!(reduced.neuron_count * 2, full.neuron_count);
        assert_eq!(reduced.sphere_segments * 2, full.sphere_segments);
        assert!(reduced.energy_points < full.energy_points);
        assert!(!reduced.secondary_light);
        assert!(!reduced.interaction.enable_pan);
        assert_eq!(reduced.interaction.two_finger, TwoFingerGesture::DollyZoom);
        assert!(reduced.camera.fov_degrees > full.camera.fov_degrees);
        assert_eq!(QualityProfile::for_flag(true), reduced);
    }
}

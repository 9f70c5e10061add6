//! Field configuration (parsed from TOML)

use crate::generator::MAX_CIRCLES;
use crate::noise::NoiseConfig;

/// Tunables for the circle field, loadable from a TOML file.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldConfig {
    /// Circles rendered per frame, in [0, 512]. A render-time parameter:
    /// changing it does not require regenerating the particle buffer.
    pub circle_count: u32,
    pub noise: NoiseConfig,
    /// Edge length of the procedurally generated background textures.
    pub texture_size: u32,
}

impl Default for FieldConfig {
    fn default() -> Self {
        Self {
            circle_count: 64,
            noise: NoiseConfig::default(),
            texture_size: 256,
        }
    }
}

impl FieldConfig {
    /// Parse a FieldConfig from a TOML table; missing keys keep defaults.
    pub fn from_toml(table: &toml::value::Table) -> Self {
        let mut config = Self::default();

        if let Some(v) = table.get("circle_count") {
            let n = v.as_integer().unwrap_or(config.circle_count as i64);
            config.circle_count = n.clamp(0, MAX_CIRCLES as i64) as u32;
        }
        if let Some(v) = table.get("texture_size") {
            let n = v.as_integer().unwrap_or(config.texture_size as i64);
            config.texture_size = n.clamp(1, 4096) as u32;
        }

        if let Some(noise) = table.get("noise").and_then(|v| v.as_table()) {
            if let Some(v) = noise.get("frequency") {
                config.noise.frequency = toml_f32(v, config.noise.frequency);
            }
            if let Some(v) = noise.get("octaves") {
                config.noise.octaves = v.as_integer().unwrap_or(4).clamp(1, 16) as u32;
            }
            if let Some(v) = noise.get("persistence") {
                config.noise.persistence = toml_f32(v, config.noise.persistence);
            }
            if let Some(v) = noise.get("lacunarity") {
                config.noise.lacunarity = toml_f32(v, config.noise.lacunarity);
            }
            if let Some(v) = noise.get("seed") {
                config.noise.seed = v.as_integer().unwrap_or(config.noise.seed as i64) as u32;
            }
        }

        config
    }
}

// ── TOML helpers (handle integer/float coercion) ──

fn toml_f32(v: &toml::Value, default: f32) -> f32 {
    v.as_float()
        .map(|f| f as f32)
        .or_else(|| v.as_integer().map(|i| i as f32))
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_sane() {
        let config = FieldConfig::default();
        assert!(config.circle_count <= MAX_CIRCLES);
        assert!(config.noise.octaves >= 1);
        assert!(config.texture_size > 0);
    }

    #[test]
    fn parse_from_toml() {
        let toml_str = r#"
circle_count = 128
texture_size = 512

[noise]
frequency = 2
octaves = 6
persistence = 0.4
seed = 99
"#;
        let table: toml::value::Table = toml::from_str(toml_str).unwrap();
        let config = FieldConfig::from_toml(&table);
        assert_eq!(config.circle_count, 128);
        assert_eq!(config.texture_size, 512);
        // Integer 2 coerces to 2.0
        assert!((config.noise.frequency - 2.0).abs() < 0.01);
        assert_eq!(config.noise.octaves, 6);
        assert!((config.noise.persistence - 0.4).abs() < 0.01);
        assert_eq!(config.noise.seed, 99);
        // Unset key keeps its default
        assert!((config.noise.lacunarity - 2.0).abs() < 0.01);
    }

    #[test]
    fn circle_count_is_clamped_on_parse() {
        let table: toml::value::Table = toml::from_str("circle_count = 9000").unwrap();
        assert_eq!(FieldConfig::from_toml(&table).circle_count, MAX_CIRCLES);

        let table: toml::value::Table = toml::from_str("circle_count = -3").unwrap();
        assert_eq!(FieldConfig::from_toml(&table).circle_count, 0);
    }
}

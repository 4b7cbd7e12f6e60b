// Semdev model quirks
// Hardware oddities keyed on vendor/product, overridable from a TOML file

use std::collections::HashMap;
use std::path::Path;

/// Hardware behavior flags for one model (or a whole vendor when
/// `product` is absent).
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct ModelQuirk {
    pub vendor: u16,
    #[serde(default)]
    pub product: Option<u16>,
    /// Skip the lateral palm strip detector (external tablets etc).
    #[serde(default)]
    pub no_palm_detect: bool,
    /// Keyboards on this device never arm disable-while-typing.
    #[serde(default)]
    pub dwt_exempt: bool,
    /// Clickpad with the extra top-button strip for a trackpoint.
    #[serde(default)]
    pub topbuttonpad: bool,
    /// Apple clickpad: no soft-button areas, clickfinger by default.
    #[serde(default)]
    pub apple_clickpad: bool,
    /// Degrees of wheel rotation per detent, when not 15.
    #[serde(default)]
    pub wheel_click_angle: Option<f64>,
    /// Mouse resolution when the hardware is known to differ from 400dpi.
    #[serde(default)]
    pub dpi: Option<u32>,
    /// Touch/hover pressure thresholds (down, up) for hover-capable pads.
    #[serde(default)]
    pub pressure_range: Option<(i32, i32)>,
}

#[derive(Debug, Default, serde::Deserialize)]
struct QuirksFile {
    #[serde(default)]
    model: Vec<ModelQuirk>,
}

#[derive(Debug, thiserror::Error)]
pub enum QuirksError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Parse(String),
}

/// The quirk database: compiled-in defaults, optionally extended from a
/// TOML file. File entries shadow built-ins for the same vendor/product.
#[derive(Debug)]
pub struct Quirks {
    by_model: HashMap<(u16, u16), ModelQuirk>,
    by_vendor: HashMap<u16, ModelQuirk>,
}

pub const DEFAULT_WHEEL_CLICK_ANGLE: f64 = 15.0;
pub const DEFAULT_MOUSE_DPI: u32 = 400;

impl Quirks {
    pub fn new() -> Self {
        let mut quirks = Self {
            by_model: HashMap::new(),
            by_vendor: HashMap::new(),
        };
        for q in builtin_quirks() {
            quirks.insert(q);
        }
        quirks
    }

    /// Load overrides from a TOML file on top of the built-ins.
    pub fn with_overrides<P: AsRef<Path>>(path: P) -> Result<Self, QuirksError> {
        let content = std::fs::read_to_string(path)?;
        let mut quirks = Self::new();
        quirks.merge_toml(&content)?;
        Ok(quirks)
    }

    pub fn merge_toml(&mut self, content: &str) -> Result<(), QuirksError> {
        let file: QuirksFile =
            toml::from_str(content).map_err(|e| QuirksError::Parse(e.to_string()))?;
        for q in file.model {
            self.insert(q);
        }
        Ok(())
    }

    fn insert(&mut self, quirk: ModelQuirk) {
        match quirk.product {
            Some(product) => {
                self.by_model.insert((quirk.vendor, product), quirk);
            }
            None => {
                self.by_vendor.insert(quirk.vendor, quirk);
            }
        }
    }

    /// Most specific match wins: exact model, then vendor, then defaults.
    pub fn lookup(&self, vendor: u16, product: u16) -> ModelQuirk {
        if let Some(q) = self.by_model.get(&(vendor, product)) {
            return q.clone();
        }
        if let Some(q) = self.by_vendor.get(&vendor) {
            return q.clone();
        }
        ModelQuirk::default()
    }

    pub fn wheel_click_angle(&self, vendor: u16, product: u16) -> f64 {
        self.lookup(vendor, product)
            .wheel_click_angle
            .unwrap_or(DEFAULT_WHEEL_CLICK_ANGLE)
    }

    pub fn mouse_dpi(&self, vendor: u16, product: u16) -> u32 {
        self.lookup(vendor, product).dpi.unwrap_or(DEFAULT_MOUSE_DPI)
    }
}

impl Default for Quirks {
    fn default() -> Self {
        Self::new()
    }
}

fn builtin_quirks() -> Vec<ModelQuirk> {
    vec![
        // Wacom external tablets: the whole surface is usable, no palm strip.
        ModelQuirk {
            vendor: 0x056a,
            no_palm_detect: true,
            dwt_exempt: true,
            ..Default::default()
        },
        // Apple clickpads
        ModelQuirk {
            vendor: 0x05ac,
            apple_clickpad: true,
            ..Default::default()
        },
        // Lenovo *40-series touchpads carry the trackpoint's buttons on top.
        ModelQuirk {
            vendor: 0x17ef,
            product: Some(0x60f3),
            topbuttonpad: true,
            ..Default::default()
        },
        // Huion external tablets, same reasoning as Wacom.
        ModelQuirk {
            vendor: 0x256c,
            no_palm_detect: true,
            dwt_exempt: true,
            ..Default::default()
        },
    ]
}

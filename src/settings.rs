//! 配置持久化 - settings.json
//!
//! 读取逐字段尽力而为: 缺失或格式错误的字段回落到默认值, 从不中断启动.
//! 保存先写临时文件再重命名, 不会留下写了一半的配置.

use crate::error::CamResult;
use crate::input::{CameraIdentity, DeviceInfo, Resolution, DEFAULT_RESOLUTION};
use crate::pipeline::{Rotation, TransformParams, BRIGHTNESS_RANGE, CONTRAST_RANGE, ZOOM_RANGE};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

/// 单个摄像头的调整参数
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct CameraProfile {
    pub brightness: i32,
    pub contrast: f64,
    pub mirror: bool,
    pub rotate: i32,
    pub zoom: f64,
    pub autofocus: bool,
    pub focus_value: u8,
}

impl Default for CameraProfile {
    fn default() -> Self {
        Self {
            brightness: 0,
            contrast: 1.0,
            mirror: false,
            rotate: 0,
            zoom: 1.0,
            autofocus: true,
            focus_value: 0,
        }
    }
}

impl CameraProfile {
    /// 从JSON对象逐字段读取, 缺失字段取 fallback
    pub fn from_value(value: &Value, fallback: &CameraProfile) -> Self {
        let Some(obj) = value.as_object() else {
            return *fallback;
        };
        Self {
            brightness: int_field(obj, "brightness")
                .map(|v| v.clamp(BRIGHTNESS_RANGE.0 as i64, BRIGHTNESS_RANGE.1 as i64) as i32)
                .unwrap_or(fallback.brightness),
            contrast: float_field(obj, "contrast")
                .map(|v| v.clamp(CONTRAST_RANGE.0, CONTRAST_RANGE.1))
                .unwrap_or(fallback.contrast),
            mirror: bool_field(obj, "mirror").unwrap_or(fallback.mirror),
            rotate: int_field(obj, "rotate")
                .and_then(|v| Rotation::from_degrees(v as i32))
                .map(|r| r.degrees())
                .unwrap_or(fallback.rotate),
            zoom: float_field(obj, "zoom")
                .map(|v| v.clamp(ZOOM_RANGE.0, ZOOM_RANGE.1))
                .unwrap_or(fallback.zoom),
            autofocus: bool_field(obj, "autofocus").unwrap_or(fallback.autofocus),
            focus_value: int_field(obj, "focus_value")
                .map(|v| v.clamp(0, 255) as u8)
                .unwrap_or(fallback.focus_value),
        }
    }

    pub fn rotation(&self) -> Rotation {
        Rotation::from_degrees(self.rotate).unwrap_or_default()
    }

    /// 换算成变换参数
    pub fn transform(&self, pan: (i32, i32)) -> TransformParams {
        TransformParams {
            brightness: self.brightness,
            contrast: self.contrast,
            rotation: self.rotation(),
            mirror: self.mirror,
            zoom: self.zoom,
            pan,
        }
    }
}

/// 完整配置文件
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Settings {
    pub camera_index: Option<usize>,
    pub camera_uid: Option<String>,
    pub resolution: String,
    pub known_resolutions: BTreeMap<String, Vec<String>>,
    pub cameras: Vec<DeviceInfo>,
    #[serde(flatten)]
    pub adjustments: CameraProfile,
    pub camera_adjustments: BTreeMap<String, CameraProfile>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            camera_index: None,
            camera_uid: None,
            resolution: DEFAULT_RESOLUTION.to_string(),
            known_resolutions: BTreeMap::new(),
            cameras: Vec::new(),
            adjustments: CameraProfile::default(),
            camera_adjustments: BTreeMap::new(),
        }
    }
}

impl Settings {
    /// 从JSON文件加载配置, 任何错误都回落到默认值
    pub fn load(path: &Path) -> Self {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) => {
                debug!("📄 配置文件 {} 不可读 ({}), 使用默认值", path.display(), e);
                return Self::default();
            }
        };
        match serde_json::from_str::<Value>(&text) {
            Ok(value) => {
                info!("✅ 配置已从 {} 加载", path.display());
                Self::from_value(&value)
            }
            Err(e) => {
                warn!("⚠️ 配置文件解析失败: {}, 使用默认值", e);
                Self::default()
            }
        }
    }

    pub fn from_value(value: &Value) -> Self {
        let defaults = Self::default();
        let Some(obj) = value.as_object() else {
            return defaults;
        };

        let known_resolutions = obj
            .get("known_resolutions")
            .and_then(Value::as_object)
            .map(|map| {
                map.iter()
                    .filter_map(|(key, list)| {
                        let list = list.as_array()?;
                        let items = list
                            .iter()
                            .filter_map(Value::as_str)
                            .filter(|s| Resolution::parse(s).is_ok())
                            .map(str::to_string)
                            .collect();
                        Some((key.clone(), items))
                    })
                    .collect()
            })
            .unwrap_or_default();

        let cameras = obj
            .get("cameras")
            .and_then(Value::as_array)
            .map(|list| {
                list.iter()
                    .filter_map(|item| serde_json::from_value::<DeviceInfo>(item.clone()).ok())
                    .collect()
            })
            .unwrap_or_default();

        let adjustments = CameraProfile::from_value(value, &defaults.adjustments);
        let camera_adjustments = obj
            .get("camera_adjustments")
            .and_then(Value::as_object)
            .map(|map| {
                map.iter()
                    .filter(|(_, v)| v.is_object())
                    .map(|(key, v)| {
                        (key.clone(), CameraProfile::from_value(v, &CameraProfile::default()))
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            camera_index: int_field(obj, "camera_index")
                .filter(|v| *v >= 0)
                .map(|v| v as usize),
            camera_uid: obj
                .get("camera_uid")
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            resolution: obj
                .get("resolution")
                .and_then(Value::as_str)
                .and_then(|s| Resolution::parse(s).ok())
                .map(|r| r.to_string())
                .unwrap_or(defaults.resolution),
            known_resolutions,
            cameras,
            adjustments,
            camera_adjustments,
        }
    }

    /// 保存到JSON文件 (临时文件 + 重命名)
    pub fn save(&self, path: &Path) -> CamResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, path)?;
        debug!("💾 配置已保存到 {}", path.display());
        Ok(())
    }

    pub fn requested_resolution(&self) -> Resolution {
        Resolution::parse(&self.resolution).unwrap_or(DEFAULT_RESOLUTION)
    }

    pub fn set_resolution(&mut self, resolution: Resolution) {
        self.resolution = resolution.to_string();
    }

    pub fn profile_for(&self, id: &CameraIdentity) -> Option<CameraProfile> {
        self.camera_adjustments.get(id.as_str()).copied()
    }

    /// 整体覆盖该摄像头的配置, 顶层字段同步为当前值
    pub fn store_profile(&mut self, id: &CameraIdentity, profile: CameraProfile) {
        self.camera_adjustments.insert(id.as_str().to_string(), profile);
        self.adjustments = profile;
    }

    pub fn known_resolutions_for(&self, id: &CameraIdentity) -> Vec<Resolution> {
        self.known_resolutions
            .get(id.as_str())
            .map(|list| list.iter().filter_map(|s| Resolution::parse(s).ok()).collect())
            .unwrap_or_default()
    }

    pub fn set_known_resolutions(&mut self, id: &CameraIdentity, list: &[Resolution]) {
        self.known_resolutions.insert(
            id.as_str().to_string(),
            list.iter().map(Resolution::to_string).collect(),
        );
    }

    /// 记住最近使用的摄像头
    pub fn remember_camera(&mut self, index: usize, id: &CameraIdentity) {
        self.camera_index = Some(index);
        self.camera_uid = Some(id.as_str().to_string());
    }
}

fn int_field(obj: &Map<String, Value>, key: &str) -> Option<i64> {
    let v = obj.get(key)?;
    v.as_i64().or_else(|| v.as_f64().map(|f| f.round() as i64))
}

fn float_field(obj: &Map<String, Value>, key: &str) -> Option<f64> {
    obj.get(key)?.as_f64().filter(|f| f.is_finite())
}

fn bool_field(obj: &Map<String, Value>, key: &str) -> Option<bool> {
    obj.get(key)?.as_bool()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir()
            .join(format!("usbcam-settings-{}-{}", std::process::id(), name))
            .join("settings.json")
    }

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.resolution, "640x480");
        assert_eq!(settings.adjustments.contrast, 1.0);
        assert!(settings.adjustments.autofocus);
        assert!(settings.camera_adjustments.is_empty());
    }

    #[test]
    fn test_per_field_fallback() {
        let value = json!({
            "camera_index": "zero",
            "resolution": "huge",
            "brightness": 500,
            "contrast": "high",
            "rotate": 45,
            "zoom": 2.5,
            "mirror": true,
            "focus_value": 300,
            "cameras": [
                {"index": 0, "uid": "cam-a", "name": "A", "available": true, "manual_focus": true},
                {"name": "missing index"}
            ],
            "known_resolutions": {"cam-a": ["1280x720", "bogus"]},
            "camera_adjustments": {"cam-a": {"brightness": 20}, "broken": 7}
        });
        let settings = Settings::from_value(&value);
        assert_eq!(settings.camera_index, None);
        assert_eq!(settings.resolution, "640x480");
        assert_eq!(settings.adjustments.brightness, 100);
        assert_eq!(settings.adjustments.contrast, 1.0);
        assert_eq!(settings.adjustments.rotate, 0);
        assert_eq!(settings.adjustments.zoom, 2.5);
        assert!(settings.adjustments.mirror);
        assert_eq!(settings.adjustments.focus_value, 255);
        assert_eq!(settings.cameras.len(), 1);
        assert_eq!(settings.known_resolutions["cam-a"], vec!["1280x720".to_string()]);

        let id = CameraIdentity::new(Some("cam-a"), 0);
        let profile = settings.profile_for(&id).unwrap();
        assert_eq!(profile.brightness, 20);
        assert_eq!(profile.contrast, 1.0);
        assert!(!settings.camera_adjustments.contains_key("broken"));
    }

    #[test]
    fn test_save_and_reload() {
        let path = temp_path("roundtrip");
        let mut settings = Settings::default();
        let id = CameraIdentity::from_index(0);
        settings.store_profile(
            &id,
            CameraProfile {
                brightness: 20,
                rotate: 90,
                ..Default::default()
            },
        );
        settings.set_known_resolutions(&id, &[Resolution::new(1280, 720), DEFAULT_RESOLUTION]);
        settings.remember_camera(0, &id);
        settings.save(&path).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let raw: Value = serde_json::from_str(&text).unwrap();
        // 顶层平铺调整字段
        assert_eq!(raw["brightness"], json!(20));
        assert_eq!(raw["camera_adjustments"]["idx:0"]["rotate"], json!(90));

        let reloaded = Settings::load(&path);
        assert_eq!(reloaded, settings);
        assert_eq!(
            reloaded.known_resolutions_for(&id),
            vec![Resolution::new(1280, 720), DEFAULT_RESOLUTION]
        );
        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_load_missing_or_corrupt() {
        let path = temp_path("corrupt");
        assert_eq!(Settings::load(&path), Settings::default());
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "{ not json").unwrap();
        assert_eq!(Settings::load(&path), Settings::default());
        let _ = fs::remove_dir_all(path.parent().unwrap());
    }
}

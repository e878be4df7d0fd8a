//! Render settings persisted in the scene document header.

use bitflags::bitflags;
use scene_common::{Element, Property};

use crate::error::DecodeError;

named_enum! {
    #[derive(Default)]
    pub enum DenoiseMode {
        None => "None",
        Fast => "Fast",
        #[default]
        Detailed => "Detailed",
    }
}

named_enum! {
    #[derive(Default)]
    pub enum DeviceType {
        Cpu => "CPU",
        #[default]
        Gpu => "GPU",
    }
}

named_enum! {
    #[derive(Default)]
    pub enum RenderMode {
        #[default]
        RenderImage => "RenderImage",
        BakeAmbientOcclusion => "BakeAmbientOcclusion",
        BakeNormals => "BakeNormals",
        BakeDiffuseLighting => "BakeDiffuseLighting",
        SceneAlbedo => "SceneAlbedo",
        SceneNormals => "SceneNormals",
        SceneDepth => "SceneDepth",
    }
}

impl RenderMode {
    /// Modes that render the scene through the camera, as opposed to baking.
    pub fn is_render_scene_mode(self) -> bool {
        matches!(
            self,
            RenderMode::RenderImage
                | RenderMode::SceneAlbedo
                | RenderMode::SceneNormals
                | RenderMode::SceneDepth
        )
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct StateFlags: u16 {
        const OUTPUT_RESULT_WITH_HDR_COLORS = 1;
        const SKY_INITIALIZED = 1 << 1;
        const HAS_RENDERING_STARTED = 1 << 2;
    }
}

impl StateFlags {
    pub fn to_property(self) -> Property {
        Property::Array(
            self.iter_names()
                .map(|(name, _)| Property::String(name.to_string()))
                .collect(),
        )
    }

    pub fn from_property(field: &'static str, property: &Property) -> Result<Self, DecodeError> {
        let Property::Array(names) = property else {
            return Err(DecodeError::UnknownEnumValue {
                field,
                value: property.type_name().to_string(),
            });
        };
        names.iter().try_fold(StateFlags::empty(), |flags, name| {
            let flag = match name {
                Property::String(name) => StateFlags::from_name(name),
                _ => None,
            };
            flag.map(|flag| flags | flag)
                .ok_or_else(|| DecodeError::UnknownEnumValue {
                    field,
                    value: format!("{name:?}"),
                })
        })
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ColorTransform {
    pub config: String,
    pub look_name: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CreateInfo {
    pub renderer: String,
    pub samples: Option<u32>,
    pub hdr_output: bool,
    pub denoise_mode: DenoiseMode,
    pub progressive: bool,
    pub progressive_refine: bool,
    pub device_type: DeviceType,
    pub exposure: f32,
    pub pre_calculate_light: bool,
    pub color_transform: Option<ColorTransform>,
}

impl Default for CreateInfo {
    fn default() -> Self {
        Self {
            renderer: "cycles".to_string(),
            samples: None,
            hdr_output: false,
            denoise_mode: DenoiseMode::Detailed,
            progressive: false,
            progressive_refine: false,
            device_type: DeviceType::Gpu,
            exposure: 1.0,
            pre_calculate_light: false,
            color_transform: None,
        }
    }
}

impl CreateInfo {
    pub fn serialize(&self, element: &mut Element) {
        element
            .insert("renderer", self.renderer.as_str())
            .insert_opt("samples", self.samples)
            .insert("hdrOutput", self.hdr_output)
            .insert("denoiseMode", self.denoise_mode.name())
            .insert("progressive", self.progressive)
            .insert("progressiveRefine", self.progressive_refine)
            .insert("deviceType", self.device_type.name())
            .insert("exposure", self.exposure)
            .insert("preCalculateLight", self.pre_calculate_light);
        if let Some(transform) = &self.color_transform {
            let mut transform_element = Element::new();
            transform_element
                .insert("config", transform.config.as_str())
                .insert_opt("lookName", transform.look_name.as_deref());
            element.insert("colorTransform", transform_element);
        }
    }

    /// Fields missing from `element` keep their defaults.
    pub fn deserialize(element: &Element) -> Result<Self, DecodeError> {
        let defaults = CreateInfo::default();
        let denoise_mode = match element.get_opt::<String>("denoiseMode")? {
            Some(name) => DenoiseMode::parse("denoiseMode", &name)?,
            None => defaults.denoise_mode,
        };
        let device_type = match element.get_opt::<String>("deviceType")? {
            Some(name) => DeviceType::parse("deviceType", &name)?,
            None => defaults.device_type,
        };
        let color_transform = match element.get_opt::<Element>("colorTransform")? {
            Some(transform) => Some(ColorTransform {
                config: transform.get_as("config")?,
                look_name: transform.get_opt("lookName")?,
            }),
            None => None,
        };
        Ok(Self {
            renderer: element.get_or("renderer", defaults.renderer)?,
            samples: element.get_opt("samples")?,
            hdr_output: element.get_or("hdrOutput", defaults.hdr_output)?,
            denoise_mode,
            progressive: element.get_or("progressive", defaults.progressive)?,
            progressive_refine: element.get_or("progressiveRefine", defaults.progressive_refine)?,
            device_type,
            exposure: element.get_or("exposure", defaults.exposure)?,
            pre_calculate_light: element.get_or("preCalculateLight", defaults.pre_calculate_light)?,
            color_transform,
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SceneInfo {
    pub sky: String,
    /// Pitch, yaw and roll in degrees.
    pub sky_angles: [f32; 3],
    pub sky_strength: f32,
    pub transparent_sky: bool,
    pub emission_strength: f32,
    pub light_intensity_factor: f32,
    pub motion_blur_strength: f32,
    pub max_transparency_bounces: u32,
    pub max_bounces: u32,
    pub max_diffuse_bounces: u32,
    pub max_glossy_bounces: u32,
    pub max_transmission_bounces: u32,
    pub exposure: f32,
    pub use_adaptive_sampling: bool,
    pub adaptive_sampling_threshold: f32,
    pub adaptive_min_samples: u32,
}

impl Default for SceneInfo {
    fn default() -> Self {
        Self {
            sky: String::new(),
            sky_angles: [0.0; 3],
            sky_strength: 1.0,
            transparent_sky: false,
            emission_strength: 1.0,
            light_intensity_factor: 1.0,
            motion_blur_strength: 0.0,
            max_transparency_bounces: 64,
            max_bounces: 12,
            max_diffuse_bounces: 4,
            max_glossy_bounces: 4,
            max_transmission_bounces: 12,
            exposure: 1.0,
            use_adaptive_sampling: true,
            adaptive_sampling_threshold: 0.01,
            adaptive_min_samples: 0,
        }
    }
}

impl SceneInfo {
    pub fn serialize(&self, element: &mut Element) {
        let mut sky = Element::new();
        if !self.sky.is_empty() {
            sky.insert("texture", self.sky.as_str());
        }
        sky.insert("angles", self.sky_angles)
            .insert("strength", self.sky_strength)
            .insert("transparent", self.transparent_sky);

        let mut limits = Element::new();
        limits
            .insert("maxTransparencyBounces", self.max_transparency_bounces)
            .insert("maxBounces", self.max_bounces)
            .insert("maxDiffuseBounces", self.max_diffuse_bounces)
            .insert("maxGlossyBounces", self.max_glossy_bounces)
            .insert("maxTransmissionBounces", self.max_transmission_bounces);

        element
            .insert("sky", sky)
            .insert("emissionStrength", self.emission_strength)
            .insert("lightIntensityFactor", self.light_intensity_factor)
            .insert("motionBlurStrength", self.motion_blur_strength)
            .insert("limits", limits)
            .insert("exposure", self.exposure)
            .insert("useAdaptiveSampling", self.use_adaptive_sampling)
            .insert("adaptiveSamplingThreshold", self.adaptive_sampling_threshold)
            .insert("adaptiveMinSamples", self.adaptive_min_samples);
    }

    pub fn deserialize(element: &Element) -> Result<Self, DecodeError> {
        let d = SceneInfo::default();
        let sky = element.get_or("sky", Element::new())?;
        let limits = element.get_or("limits", Element::new())?;
        Ok(Self {
            sky: sky.get_or("texture", d.sky)?,
            sky_angles: sky.get_or("angles", d.sky_angles)?,
            sky_strength: sky.get_or("strength", d.sky_strength)?,
            transparent_sky: sky.get_or("transparent", d.transparent_sky)?,
            emission_strength: element.get_or("emissionStrength", d.emission_strength)?,
            light_intensity_factor: element.get_or("lightIntensityFactor", d.light_intensity_factor)?,
            motion_blur_strength: element.get_or("motionBlurStrength", d.motion_blur_strength)?,
            max_transparency_bounces: limits.get_or("maxTransparencyBounces", d.max_transparency_bounces)?,
            max_bounces: limits.get_or("maxBounces", d.max_bounces)?,
            max_diffuse_bounces: limits.get_or("maxDiffuseBounces", d.max_diffuse_bounces)?,
            max_glossy_bounces: limits.get_or("maxGlossyBounces", d.max_glossy_bounces)?,
            max_transmission_bounces: limits.get_or("maxTransmissionBounces", d.max_transmission_bounces)?,
            exposure: element.get_or("exposure", d.exposure)?,
            use_adaptive_sampling: element.get_or("useAdaptiveSampling", d.use_adaptive_sampling)?,
            adaptive_sampling_threshold: element
                .get_or("adaptiveSamplingThreshold", d.adaptive_sampling_threshold)?,
            adaptive_min_samples: element.get_or("adaptiveMinSamples", d.adaptive_min_samples)?,
        })
    }
}

pub mod vitals;

pub use vitals::{
    DataQuality, DeviceInfo, DeviceType, LiveDeviceSample, MergedVitals, SignalQuality,
    VitalsReading,
};

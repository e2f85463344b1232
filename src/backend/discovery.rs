//! Serial port discovery
//!
//! Turns the OS port listing into [`PortInfo`] entries and finds the
//! analyzer board by its USB hardware identifier. Hardware ids are
//! rendered as `USB VID:PID=0483:374B SER=...`, so a substring search for
//! `VID:PID=0483:374B` finds the board regardless of serial number.

use crate::types::PortInfo;
use serialport::{SerialPortInfo, SerialPortType, UsbPortInfo};

/// Render the hardware id of a USB serial device
pub fn usb_hardware_id(vid: u16, pid: u16, serial_number: Option<&str>) -> String {
    match serial_number {
        Some(sn) if !sn.is_empty() => format!("USB VID:PID={:04X}:{:04X} SER={}", vid, pid, sn),
        _ => format!("USB VID:PID={:04X}:{:04X}", vid, pid),
    }
}

fn usb_description(info: &UsbPortInfo) -> String {
    match (&info.manufacturer, &info.product) {
        (Some(m), Some(p)) if !p.contains(m.as_str()) => format!("{} {}", m, p),
        (_, Some(p)) => p.clone(),
        (Some(m), None) => m.clone(),
        (None, None) => "USB Serial Device".to_string(),
    }
}

/// Convert an OS listing entry
pub fn describe_port(info: SerialPortInfo) -> PortInfo {
    match &info.port_type {
        SerialPortType::UsbPort(usb) => PortInfo::new(info.port_name.clone(), usb_description(usb))
            .with_hardware_id(usb_hardware_id(usb.vid, usb.pid, usb.serial_number.as_deref())),
        SerialPortType::PciPort => PortInfo::new(info.port_name, "PCI serial port"),
        SerialPortType::BluetoothPort => PortInfo::new(info.port_name, "Bluetooth serial port"),
        SerialPortType::Unknown => PortInfo::new(info.port_name, "Serial port"),
    }
}

/// First port whose hardware id contains `needle` (case-insensitive)
pub fn find_by_hardware_id<'a>(ports: &'a [PortInfo], needle: &str) -> Option<&'a PortInfo> {
    ports.iter().find(|p| p.matches_hardware_id(needle))
}

/// Preferred port to preselect in the UI
///
/// A hardware id match wins, then the previously used port if it is still
/// present, then the first listed port.
pub fn preferred_port<'a>(
    ports: &'a [PortInfo],
    hardware_id: Option<&str>,
    last_port: Option<&str>,
) -> Option<&'a PortInfo> {
    hardware_id
        .and_then(|id| find_by_hardware_id(ports, id))
        .or_else(|| last_port.and_then(|last| ports.iter().find(|p| p.port_id == last)))
        .or_else(|| ports.first())
}

//! Virtual input devices synthesized via the kernel's `uinput` module.
//!
//! Each device type (keyboard, dpad, mouse, touchscreen, stylus) opens its
//! own `/dev/uinput` node, declares the evdev capability bits it needs, and
//! is torn down (via `UI_DEV_DESTROY`) when dropped. This is the alternative
//! injection path the controller uses when `USE_UINPUT` is set, bypassing
//! the platform input-injection accessor entirely in favor of kernel-level
//! synthetic devices.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::os::unix::io::AsRawFd;
use std::time::{SystemTime, UNIX_EPOCH};

use nix::{ioctl_none, ioctl_write_int};
use tracing::warn;

use crate::error::{InputError, Result};

const UINPUT_PATH: &str = "/dev/uinput";
const UINPUT_MAX_NAME_SIZE: usize = 80;
const BUS_VIRTUAL: u16 = 0x06;

const EV_SYN: u16 = 0x00;
const EV_KEY: u16 = 0x01;
const EV_REL: u16 = 0x02;
const EV_ABS: u16 = 0x03;

const SYN_REPORT: u16 = 0;

pub const REL_X: u16 = 0x00;
pub const REL_Y: u16 = 0x01;
pub const REL_WHEEL: u16 = 0x08;
pub const REL_HWHEEL: u16 = 0x06;

pub const ABS_X: u16 = 0x00;
pub const ABS_Y: u16 = 0x01;
pub const ABS_PRESSURE: u16 = 0x18;
pub const ABS_TILT_X: u16 = 0x1a;
pub const ABS_TILT_Y: u16 = 0x1b;
pub const ABS_MT_SLOT: u16 = 0x2f;
pub const ABS_MT_TOUCH_MAJOR: u16 = 0x30;
pub const ABS_MT_POSITION_X: u16 = 0x35;
pub const ABS_MT_POSITION_Y: u16 = 0x36;
pub const ABS_MT_TRACKING_ID: u16 = 0x39;

pub const BTN_LEFT: u16 = 0x110;
pub const BTN_RIGHT: u16 = 0x111;
pub const BTN_MIDDLE: u16 = 0x112;
pub const BTN_TOUCH: u16 = 0x14a;
pub const BTN_STYLUS: u16 = 0x14b;
pub const BTN_TOOL_PEN: u16 = 0x140;

const UINPUT_IOCTL_BASE: u8 = b'U';
ioctl_write_int!(ui_set_evbit, UINPUT_IOCTL_BASE, 100);
ioctl_write_int!(ui_set_keybit, UINPUT_IOCTL_BASE, 101);
ioctl_write_int!(ui_set_relbit, UINPUT_IOCTL_BASE, 102);
ioctl_write_int!(ui_set_absbit, UINPUT_IOCTL_BASE, 103);
ioctl_none!(ui_dev_create, UINPUT_IOCTL_BASE, 1);
ioctl_none!(ui_dev_destroy, UINPUT_IOCTL_BASE, 2);

#[repr(C)]
struct UinputUserDev {
    name: [u8; UINPUT_MAX_NAME_SIZE],
    id_bustype: u16,
    id_vendor: u16,
    id_product: u16,
    id_version: u16,
    ff_effects_max: u32,
    abs_max: [i32; 64],
    abs_min: [i32; 64],
    abs_fuzz: [i32; 64],
    abs_flat: [i32; 64],
}

impl UinputUserDev {
    fn named(name: &str) -> Self {
        let mut name_buf = [0u8; UINPUT_MAX_NAME_SIZE];
        let bytes = name.as_bytes();
        let n = bytes.len().min(UINPUT_MAX_NAME_SIZE - 1);
        name_buf[..n].copy_from_slice(&bytes[..n]);
        Self {
            name: name_buf,
            id_bustype: BUS_VIRTUAL,
            id_vendor: 0,
            id_product: 0,
            id_version: 1,
            ff_effects_max: 0,
            abs_max: [0; 64],
            abs_min: [0; 64],
            abs_fuzz: [0; 64],
            abs_flat: [0; 64],
        }
    }

    fn set_abs_range(&mut self, code: u16, min: i32, max: i32) {
        let i = code as usize;
        self.abs_min[i] = min;
        self.abs_max[i] = max;
    }
}

#[repr(C)]
struct InputEvent {
    tv_sec: i64,
    tv_usec: i64,
    kind: u16,
    code: u16,
    value: i32,
}

/// A short, unique identifier assigned to a virtual input device so the
/// platform can associate it with a specific display (a "phys name", per
/// the glossary).
fn phys_name(label: &str, counter: u64) -> String {
    format!("screenshare-agent/{label}{counter}")
}

/// Base type shared by every virtual input device: owns the `/dev/uinput`
/// file descriptor and the low-level event-write plumbing. Destroyed on
/// drop via `UI_DEV_DESTROY`.
pub struct VirtualInputDevice {
    file: File,
    phys: String,
}

impl VirtualInputDevice {
    fn open() -> Result<File> {
        OpenOptions::new()
            .read(true)
            .write(true)
            .open(UINPUT_PATH)
            .map_err(|e| InputError::Init(format!("opening {UINPUT_PATH}: {e}")))
    }

    fn set_evbit(&self, ev: u16) -> Result<()> {
        unsafe { ui_set_evbit(self.file.as_raw_fd(), i32::from(ev)) }
            .map(|_| ())
            .map_err(|e| InputError::Ioctl("UI_SET_EVBIT", e.into()))
    }

    fn set_keybit(&self, code: u16) -> Result<()> {
        unsafe { ui_set_keybit(self.file.as_raw_fd(), i32::from(code)) }
            .map(|_| ())
            .map_err(|e| InputError::Ioctl("UI_SET_KEYBIT", e.into()))
    }

    fn set_relbit(&self, code: u16) -> Result<()> {
        unsafe { ui_set_relbit(self.file.as_raw_fd(), i32::from(code)) }
            .map(|_| ())
            .map_err(|e| InputError::Ioctl("UI_SET_RELBIT", e.into()))
    }

    fn set_absbit(&self, code: u16) -> Result<()> {
        unsafe { ui_set_absbit(self.file.as_raw_fd(), i32::from(code)) }
            .map(|_| ())
            .map_err(|e| InputError::Ioctl("UI_SET_ABSBIT", e.into()))
    }

    /// Registers the device using the legacy `uinput_user_dev` protocol: the
    /// whole struct (name, id, and per-axis abs ranges in fixed-size arrays)
    /// is `write()`-ed to the fd directly rather than passed through an
    /// ioctl — unlike `UI_DEV_SETUP`/`UI_ABS_SETUP`, this struct has no
    /// ioctl of its own.
    fn create(&mut self, dev: &UinputUserDev) -> Result<()> {
        let bytes = unsafe {
            std::slice::from_raw_parts(
                (dev as *const UinputUserDev).cast::<u8>(),
                std::mem::size_of::<UinputUserDev>(),
            )
        };
        self.file
            .write_all(bytes)
            .map_err(|e| InputError::Ioctl("write(uinput_user_dev)", e))?;
        unsafe {
            ui_dev_create(self.file.as_raw_fd())
                .map_err(|e| InputError::Ioctl("UI_DEV_CREATE", e.into()))?;
        }
        Ok(())
    }

    fn write_event(&mut self, kind: u16, code: u16, value: i32) -> Result<()> {
        let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
        let ev = InputEvent {
            tv_sec: now.as_secs() as i64,
            tv_usec: i64::from(now.subsec_micros()),
            kind,
            code,
            value,
        };
        let bytes = unsafe {
            std::slice::from_raw_parts(
                (&ev as *const InputEvent).cast::<u8>(),
                std::mem::size_of::<InputEvent>(),
            )
        };
        self.file
            .write_all(bytes)
            .map_err(|e| InputError::Ioctl("write(input_event)", e))
    }

    fn sync(&mut self) -> Result<()> {
        self.write_event(EV_SYN, SYN_REPORT, 0)
    }

    #[must_use]
    pub fn phys(&self) -> &str {
        &self.phys
    }
}

impl Drop for VirtualInputDevice {
    fn drop(&mut self) {
        if let Err(e) = unsafe { ui_dev_destroy(self.file.as_raw_fd()) } {
            warn!(phys = %self.phys, error = %e, "UI_DEV_DESTROY failed");
        }
    }
}

fn build(name: &str, label: &str, counter: u64, configure: impl FnOnce(&VirtualInputDevice, &mut UinputUserDev) -> Result<()>) -> Result<VirtualInputDevice> {
    let file = VirtualInputDevice::open()?;
    let phys = phys_name(label, counter);
    let mut device = VirtualInputDevice { file, phys };
    device.set_evbit(EV_SYN)?;
    let mut dev = UinputUserDev::named(name);
    configure(&device, &mut dev)?;
    device.create(&dev)?;
    Ok(device)
}

/// Synthesizes keyboard key-down/key-up events.
pub struct VirtualKeyboard {
    device: VirtualInputDevice,
}

impl VirtualKeyboard {
    pub fn new(counter: u64) -> Result<Self> {
        let device = build("screenshare-agent-keyboard", "keyboard", counter, |d, _dev| {
            d.set_evbit(EV_KEY)?;
            for code in 0u16..248 {
                d.set_keybit(code)?;
            }
            Ok(())
        })?;
        Ok(Self { device })
    }

    pub fn write_key_event(&mut self, keycode: i32, action: i32) -> Result<()> {
        let pressed = i32::from(action == crate::event::action::DOWN);
        self.device.write_event(EV_KEY, keycode as u16, pressed)?;
        self.device.sync()
    }
}

/// Synthesizes D-pad directional key events, sharing the keyboard's key
/// action semantics over a separate device so the platform can tell the two
/// input classes apart.
pub struct VirtualDpad {
    device: VirtualInputDevice,
}

impl VirtualDpad {
    pub fn new(counter: u64) -> Result<Self> {
        let device = build("screenshare-agent-dpad", "dpad", counter, |d, _dev| {
            d.set_evbit(EV_KEY)?;
            for code in 0u16..248 {
                d.set_keybit(code)?;
            }
            Ok(())
        })?;
        Ok(Self { device })
    }

    pub fn write_dpad_key_event(&mut self, keycode: i32, action: i32) -> Result<()> {
        let pressed = i32::from(action == crate::event::action::DOWN);
        self.device.write_event(EV_KEY, keycode as u16, pressed)?;
        self.device.sync()
    }
}

/// Synthesizes relative mouse motion, button, and scroll events.
pub struct VirtualMouse {
    device: VirtualInputDevice,
}

impl VirtualMouse {
    pub fn new(counter: u64) -> Result<Self> {
        let device = build("screenshare-agent-mouse", "mouse", counter, |d, _dev| {
            d.set_evbit(EV_KEY)?;
            d.set_evbit(EV_REL)?;
            for btn in [BTN_LEFT, BTN_RIGHT, BTN_MIDDLE] {
                d.set_keybit(btn)?;
            }
            for rel in [REL_X, REL_Y, REL_WHEEL, REL_HWHEEL] {
                d.set_relbit(rel)?;
            }
            Ok(())
        })?;
        Ok(Self { device })
    }

    pub fn write_button_event(&mut self, button: u16, action: i32) -> Result<()> {
        let pressed = i32::from(action == crate::event::action::DOWN);
        self.device.write_event(EV_KEY, button, pressed)?;
        self.device.sync()
    }

    pub fn write_relative_event(&mut self, dx: i32, dy: i32) -> Result<()> {
        self.device.write_event(EV_REL, REL_X, dx)?;
        self.device.write_event(EV_REL, REL_Y, dy)?;
        self.device.sync()
    }

    pub fn write_scroll_event(&mut self, x_movement: i32, y_movement: i32) -> Result<()> {
        self.device.write_event(EV_REL, REL_HWHEEL, x_movement)?;
        self.device.write_event(EV_REL, REL_WHEEL, y_movement)?;
        self.device.sync()
    }
}

const MAX_POINTERS: usize = 20;

/// Synthesizes multi-touch events using the kernel's protocol-B multitouch
/// slot model: each active pointer owns an `ABS_MT_SLOT`, assigned a
/// tracking id on DOWN and released (-1) on UP.
pub struct VirtualTouchscreen {
    device: VirtualInputDevice,
    active_pointers: [bool; MAX_POINTERS],
    width: i32,
    height: i32,
}

impl VirtualTouchscreen {
    pub const MAX_PRESSURE: i32 = 255;

    pub fn new(counter: u64, width: i32, height: i32) -> Result<Self> {
        let device = build("screenshare-agent-touchscreen", "touchscreen", counter, |d, dev| {
            d.set_evbit(EV_KEY)?;
            d.set_evbit(EV_ABS)?;
            d.set_keybit(BTN_TOUCH)?;
            for code in [
                ABS_MT_SLOT,
                ABS_MT_TRACKING_ID,
                ABS_MT_POSITION_X,
                ABS_MT_POSITION_Y,
                ABS_MT_TOUCH_MAJOR,
            ] {
                d.set_absbit(code)?;
            }
            dev.set_abs_range(ABS_MT_SLOT, 0, MAX_POINTERS as i32 - 1);
            dev.set_abs_range(ABS_MT_TRACKING_ID, -1, 65535);
            dev.set_abs_range(ABS_MT_POSITION_X, 0, width.max(1));
            dev.set_abs_range(ABS_MT_POSITION_Y, 0, height.max(1));
            dev.set_abs_range(ABS_MT_TOUCH_MAJOR, 0, 255);
            Ok(())
        })?;
        Ok(Self {
            device,
            active_pointers: [false; MAX_POINTERS],
            width,
            height,
        })
    }

    fn is_valid_pointer_id(&self, pointer_id: i32, is_down: bool) -> bool {
        if pointer_id < 0 || pointer_id as usize >= MAX_POINTERS {
            return false;
        }
        self.active_pointers[pointer_id as usize] != is_down
    }

    /// Writes one touch event. `action` is a motion action code (DOWN,
    /// UP, MOVE — callers should not pass POINTER_DOWN/POINTER_UP since
    /// each pointer has its own slot here).
    pub fn write_touch_event(
        &mut self,
        pointer_id: i32,
        action: i32,
        x: i32,
        y: i32,
        pressure: i32,
    ) -> Result<()> {
        use crate::event::action as a;

        if pointer_id < 0 || pointer_id as usize >= MAX_POINTERS {
            return Err(InputError::PointerOutOfRange(pointer_id, MAX_POINTERS));
        }

        let going_down = action == a::DOWN;
        let going_up = action == a::UP || action == a::CANCEL;
        if (going_down && !self.is_valid_pointer_id(pointer_id, true))
            || (going_up && !self.is_valid_pointer_id(pointer_id, false))
        {
            return Err(InputError::PointerOutOfRange(pointer_id, MAX_POINTERS));
        }

        self.device.write_event(EV_ABS, ABS_MT_SLOT, pointer_id)?;
        if going_down {
            self.device.write_event(EV_ABS, ABS_MT_TRACKING_ID, pointer_id)?;
            self.active_pointers[pointer_id as usize] = true;
            self.device.write_event(EV_KEY, BTN_TOUCH, 1)?;
        }

        self.device
            .write_event(EV_ABS, ABS_MT_POSITION_X, x.clamp(0, self.width.max(1)))?;
        self.device
            .write_event(EV_ABS, ABS_MT_POSITION_Y, y.clamp(0, self.height.max(1)))?;
        self.device.write_event(EV_ABS, ABS_MT_TOUCH_MAJOR, pressure.clamp(0, 255))?;

        if going_up {
            self.device.write_event(EV_ABS, ABS_MT_TRACKING_ID, -1)?;
            self.active_pointers[pointer_id as usize] = false;
            if self.active_pointers.iter().all(|&p| !p) {
                self.device.write_event(EV_KEY, BTN_TOUCH, 0)?;
            }
        }

        self.device.sync()
    }
}

/// Synthesizes stylus hover/touch motion and button events.
pub struct VirtualStylus {
    device: VirtualInputDevice,
    is_down: bool,
}

impl VirtualStylus {
    pub fn new(counter: u64, width: i32, height: i32) -> Result<Self> {
        let device = build("screenshare-agent-stylus", "stylus", counter, |d, dev| {
            d.set_evbit(EV_KEY)?;
            d.set_evbit(EV_ABS)?;
            for btn in [BTN_TOOL_PEN, BTN_TOUCH, BTN_STYLUS] {
                d.set_keybit(btn)?;
            }
            for code in [ABS_X, ABS_Y, ABS_PRESSURE, ABS_TILT_X, ABS_TILT_Y] {
                d.set_absbit(code)?;
            }
            dev.set_abs_range(ABS_X, 0, width.max(1));
            dev.set_abs_range(ABS_Y, 0, height.max(1));
            dev.set_abs_range(ABS_PRESSURE, 0, 255);
            dev.set_abs_range(ABS_TILT_X, -90, 90);
            dev.set_abs_range(ABS_TILT_Y, -90, 90);
            Ok(())
        })?;
        Ok(Self { device, is_down: false })
    }

    pub fn write_motion_event(
        &mut self,
        action: i32,
        x: i32,
        y: i32,
        pressure: i32,
        tilt_x: i32,
        tilt_y: i32,
    ) -> Result<()> {
        use crate::event::action as a;

        self.device.write_event(EV_KEY, BTN_TOOL_PEN, 1)?;
        self.device.write_event(EV_ABS, ABS_X, x.clamp(0, i32::MAX))?;
        self.device.write_event(EV_ABS, ABS_Y, y.clamp(0, i32::MAX))?;
        self.device.write_event(EV_ABS, ABS_PRESSURE, pressure.clamp(0, 255))?;
        self.device.write_event(EV_ABS, ABS_TILT_X, tilt_x)?;
        self.device.write_event(EV_ABS, ABS_TILT_Y, tilt_y)?;

        if action == a::DOWN && !self.is_down {
            self.is_down = true;
            self.device.write_event(EV_KEY, BTN_TOUCH, 1)?;
        } else if (action == a::UP || action == a::CANCEL) && self.is_down {
            self.is_down = false;
            self.device.write_event(EV_KEY, BTN_TOUCH, 0)?;
        }
        self.device.sync()
    }

    pub fn write_button_event(&mut self, button: u16, action: i32) -> Result<()> {
        let pressed = i32::from(action == crate::event::action::DOWN);
        self.device.write_event(EV_KEY, button, pressed)?;
        self.device.sync()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phys_names_are_unique_per_counter() {
        assert_ne!(phys_name("mouse", 0), phys_name("mouse", 1));
        assert!(phys_name("touchscreen", 3).contains("touchscreen3"));
    }

    #[test]
    fn uinput_user_dev_truncates_overlong_names() {
        let name = "x".repeat(200);
        let dev = UinputUserDev::named(&name);
        assert_eq!(dev.name[UINPUT_MAX_NAME_SIZE - 1], 0);
    }
}

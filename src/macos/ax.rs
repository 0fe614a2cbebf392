//! AXUIElement-backed implementation of the element bridge.
//!
//! Talks to the Accessibility API of the Notification Center process,
//! which hosts both banner windows and widget panels. Raw FFI against
//! ApplicationServices; CFString/CFArray memory management goes through
//! the core-foundation wrappers.

use std::cell::Cell;
use std::ffi::c_void;

use core_foundation::array::{CFArray, CFArrayRef};
use core_foundation::base::{CFRelease, CFRetain, CFType, CFTypeRef, TCFType};
use core_foundation::dictionary::{CFDictionary, CFDictionaryRef};
use core_foundation::number::CFNumber;
use core_foundation::string::{CFString, CFStringRef};
use core_graphics::geometry::{CGPoint, CGSize};
use core_graphics::window::{kCGNullWindowID, kCGWindowListOptionOnScreenOnly};

use crate::bridge::{ElementBridge, ElementError, ElementResult};
use crate::geometry::{Point, Size};

// AXError codes from AXError.h; raw values end up in logs.
const AX_SUCCESS: i32 = 0;
const AX_ERROR_FAILURE: i32 = -25200;
const AX_ERROR_ILLEGAL_ARGUMENT: i32 = -25201;
const AX_ERROR_INVALID_UI_ELEMENT: i32 = -25202;
const AX_ERROR_ATTRIBUTE_UNSUPPORTED: i32 = -25205;
const AX_ERROR_NOT_IMPLEMENTED: i32 = -25208;
const AX_ERROR_API_DISABLED: i32 = -25211;
const AX_ERROR_NO_VALUE: i32 = -25212;

// AXValueType constants.
const AX_VALUE_CGPOINT_TYPE: u32 = 1;
const AX_VALUE_CGSIZE_TYPE: u32 = 2;

const ATTR_ROLE: &str = "AXRole";
const ATTR_CHILDREN: &str = "AXChildren";
const ATTR_SIZE: &str = "AXSize";
const ATTR_POSITION: &str = "AXPosition";
const ATTR_IDENTIFIER: &str = "AXIdentifier";
const ATTR_SUBROLE: &str = "AXSubrole";

/// Bundle id of the process that renders banners and widget panels.
const OVERLAY_HOST_BUNDLE_ID: &str = "com.apple.notificationcenterui";

type AXUIElementRef = *const c_void;
type AXValueRef = *const c_void;

#[link(name = "ApplicationServices", kind = "framework")]
unsafe extern "C" {
    fn AXUIElementCreateApplication(pid: i32) -> AXUIElementRef;
    fn AXUIElementCopyAttributeValue(
        element: AXUIElementRef,
        attribute: CFStringRef,
        value: *mut CFTypeRef,
    ) -> i32;
    fn AXUIElementSetAttributeValue(
        element: AXUIElementRef,
        attribute: CFStringRef,
        value: CFTypeRef,
    ) -> i32;
    fn AXUIElementIsAttributeSettable(
        element: AXUIElementRef,
        attribute: CFStringRef,
        settable: *mut u8,
    ) -> i32;
    fn AXValueCreate(value_type: u32, value_ptr: *const c_void) -> AXValueRef;
    fn AXValueGetValue(value: AXValueRef, value_type: u32, value_ptr: *mut c_void) -> u8;
    /// Private but long-stable SPI; the only stable numeric window
    /// identity the AX API exposes.
    fn _AXUIElementGetWindow(element: AXUIElementRef, window_id: *mut u32) -> i32;
}

fn map_ax_error(code: i32) -> ElementError {
    match code {
        AX_ERROR_API_DISABLED => ElementError::PermissionDenied(code),
        AX_ERROR_INVALID_UI_ELEMENT | AX_ERROR_ILLEGAL_ARGUMENT => ElementError::Invalid(code),
        AX_ERROR_ATTRIBUTE_UNSUPPORTED | AX_ERROR_NOT_IMPLEMENTED | AX_ERROR_NO_VALUE => {
            ElementError::Unsupported(code)
        }
        // CannotComplete, Failure, and anything a future OS invents.
        _ => ElementError::Transient(code),
    }
}

/// Owning handle to one AXUIElement. Poll-scoped: the engine drops and
/// re-acquires these every cycle, so staleness surfaces as `Invalid` on
/// the next I/O rather than as dangling state.
pub struct AxNode(AXUIElementRef);

impl AxNode {
    /// Takes ownership under the create rule.
    fn from_create(raw: AXUIElementRef) -> Self {
        Self(raw)
    }

    /// Retains a borrowed reference (get rule).
    fn from_get(raw: AXUIElementRef) -> Self {
        unsafe { CFRetain(raw as CFTypeRef) };
        Self(raw)
    }
}

impl Clone for AxNode {
    fn clone(&self) -> Self {
        Self::from_get(self.0)
    }
}

impl Drop for AxNode {
    fn drop(&mut self) {
        unsafe { CFRelease(self.0 as CFTypeRef) };
    }
}

// AXUIElement is a CoreFoundation object; retain/release and the AX calls
// are thread safe, and all engine I/O happens on the scheduler thread.
unsafe impl Send for AxNode {}

fn copy_attribute(node: &AxNode, name: &'static str) -> ElementResult<CFType> {
    let attribute = CFString::from_static_string(name);
    let mut value: CFTypeRef = std::ptr::null();
    let err = unsafe {
        AXUIElementCopyAttributeValue(node.0, attribute.as_concrete_TypeRef(), &mut value)
    };
    if err != AX_SUCCESS {
        return Err(map_ax_error(err));
    }
    if value.is_null() {
        return Err(ElementError::Unsupported(AX_ERROR_NO_VALUE));
    }
    Ok(unsafe { CFType::wrap_under_create_rule(value) })
}

fn copy_string_attribute(node: &AxNode, name: &'static str) -> ElementResult<Option<String>> {
    match copy_attribute(node, name) {
        Ok(value) => {
            if !value.instance_of::<CFString>() {
                return Ok(None);
            }
            let string =
                unsafe { CFString::wrap_under_get_rule(value.as_CFTypeRef() as CFStringRef) };
            Ok(Some(string.to_string()))
        }
        Err(ElementError::Unsupported(_)) => Ok(None),
        Err(err) => Err(err),
    }
}

/// Finds the Notification Center pid by scanning the on-screen window list
/// for its owner. Works from any thread, unlike NSWorkspace, so the engine
/// can re-resolve after the host process restarts.
fn resolve_host_pid() -> Option<i32> {
    let info = core_graphics::window::copy_window_info(
        kCGWindowListOptionOnScreenOnly,
        kCGNullWindowID,
    )?;

    let owner_key = CFString::from_static_string("kCGWindowOwnerName");
    let pid_key = CFString::from_static_string("kCGWindowOwnerPID");

    for item in info.iter() {
        let dict = unsafe {
            CFDictionary::<CFString, CFType>::wrap_under_get_rule(*item as CFDictionaryRef)
        };
        let Some(owner) = dict.find(&owner_key) else {
            continue;
        };
        if !owner.instance_of::<CFString>() {
            continue;
        }
        let owner =
            unsafe { CFString::wrap_under_get_rule(owner.as_CFTypeRef() as CFStringRef) }
                .to_string();
        // Owner name is localized; match the spellings in the wild.
        if owner != "Notification Center"
            && owner != "NotificationCenter"
            && owner != "Notification Centre"
        {
            continue;
        }
        let Some(pid) = dict.find(&pid_key) else {
            continue;
        };
        if !pid.instance_of::<CFNumber>() {
            continue;
        }
        let pid = unsafe {
            CFNumber::wrap_under_get_rule(pid.as_CFTypeRef() as core_foundation::number::CFNumberRef)
        };
        if let Some(pid) = pid.to_i32() {
            return Some(pid);
        }
    }
    None
}

/// Resolves the overlay host pid via NSWorkspace (bundle id match). Main
/// thread only; used once at startup.
pub fn overlay_host_pid() -> Option<i32> {
    use objc2_app_kit::NSWorkspace;

    let workspace = unsafe { NSWorkspace::sharedWorkspace() };
    let apps = unsafe { workspace.runningApplications() };
    for app in apps.iter() {
        let Some(bundle_id) = unsafe { app.bundleIdentifier() } else {
            continue;
        };
        if bundle_id.to_string() == OVERLAY_HOST_BUNDLE_ID {
            return Some(unsafe { app.processIdentifier() });
        }
    }
    None
}

/// The production element bridge. Stateless apart from the cached host
/// pid, which is re-resolved whenever the application element goes stale
/// (Notification Center restarts on login and occasionally crashes).
pub struct AxBridge {
    pid: Cell<Option<i32>>,
}

impl AxBridge {
    pub fn new(pid: Option<i32>) -> Self {
        Self {
            pid: Cell::new(pid),
        }
    }

    fn application_element(&self, pid: i32) -> AxNode {
        AxNode::from_create(unsafe { AXUIElementCreateApplication(pid) })
    }
}

impl ElementBridge for AxBridge {
    type Node = AxNode;

    fn overlay_root(&self) -> ElementResult<AxNode> {
        if let Some(pid) = self.pid.get() {
            let root = self.application_element(pid);
            // Cheap liveness probe; a dead pid answers Invalid here.
            match copy_attribute(&root, ATTR_ROLE) {
                Ok(_) => return Ok(root),
                Err(err @ ElementError::PermissionDenied(_)) => return Err(err),
                Err(err) => {
                    log::info!(
                        "overlay host pid {} went stale ({}); re-resolving",
                        pid,
                        err
                    );
                    self.pid.set(None);
                }
            }
        }

        let pid = resolve_host_pid().ok_or(ElementError::Invalid(AX_ERROR_FAILURE))?;
        log::info!("overlay host resolved to pid {}", pid);
        self.pid.set(Some(pid));
        Ok(self.application_element(pid))
    }

    fn children(&self, node: &AxNode) -> ElementResult<Vec<AxNode>> {
        let value = copy_attribute(node, ATTR_CHILDREN)?;
        if !value.instance_of::<CFArray>() {
            return Err(ElementError::Unsupported(AX_ERROR_NO_VALUE));
        }
        let array =
            unsafe { CFArray::<*const c_void>::wrap_under_get_rule(value.as_CFTypeRef() as CFArrayRef) };
        let mut children = Vec::with_capacity(array.len() as usize);
        for item in array.iter() {
            children.push(AxNode::from_get(*item));
        }
        Ok(children)
    }

    fn size(&self, node: &AxNode) -> ElementResult<Size> {
        let value = copy_attribute(node, ATTR_SIZE)?;
        let mut size = CGSize::new(0.0, 0.0);
        let ok = unsafe {
            AXValueGetValue(
                value.as_CFTypeRef(),
                AX_VALUE_CGSIZE_TYPE,
                &mut size as *mut CGSize as *mut c_void,
            )
        };
        if ok == 0 {
            return Err(ElementError::Unsupported(AX_ERROR_NO_VALUE));
        }
        Ok(Size::new(size.width, size.height))
    }

    fn position(&self, node: &AxNode) -> ElementResult<Point> {
        let value = copy_attribute(node, ATTR_POSITION)?;
        let mut point = CGPoint::new(0.0, 0.0);
        let ok = unsafe {
            AXValueGetValue(
                value.as_CFTypeRef(),
                AX_VALUE_CGPOINT_TYPE,
                &mut point as *mut CGPoint as *mut c_void,
            )
        };
        if ok == 0 {
            return Err(ElementError::Unsupported(AX_ERROR_NO_VALUE));
        }
        Ok(Point::new(point.x, point.y))
    }

    fn identifier(&self, node: &AxNode) -> ElementResult<Option<String>> {
        copy_string_attribute(node, ATTR_IDENTIFIER)
    }

    fn subrole(&self, node: &AxNode) -> ElementResult<Option<String>> {
        copy_string_attribute(node, ATTR_SUBROLE)
    }

    fn window_id(&self, node: &AxNode) -> ElementResult<u32> {
        let mut window_id: u32 = 0;
        let err = unsafe { _AXUIElementGetWindow(node.0, &mut window_id) };
        if err != AX_SUCCESS {
            return Err(map_ax_error(err));
        }
        Ok(window_id)
    }

    fn is_position_writable(&self, node: &AxNode) -> ElementResult<bool> {
        let attribute = CFString::from_static_string(ATTR_POSITION);
        let mut settable: u8 = 0;
        let err = unsafe {
            AXUIElementIsAttributeSettable(node.0, attribute.as_concrete_TypeRef(), &mut settable)
        };
        if err != AX_SUCCESS {
            return Err(map_ax_error(err));
        }
        Ok(settable != 0)
    }

    fn set_position(&self, node: &AxNode, point: Point) -> ElementResult<()> {
        let cg_point = CGPoint::new(point.x, point.y);
        let value =
            unsafe { AXValueCreate(AX_VALUE_CGPOINT_TYPE, &cg_point as *const CGPoint as *const c_void) };
        if value.is_null() {
            return Err(ElementError::Transient(AX_ERROR_FAILURE));
        }
        let value = unsafe { CFType::wrap_under_create_rule(value) };

        let attribute = CFString::from_static_string(ATTR_POSITION);
        let err = unsafe {
            AXUIElementSetAttributeValue(
                node.0,
                attribute.as_concrete_TypeRef(),
                value.as_CFTypeRef(),
            )
        };
        if err != AX_SUCCESS {
            return Err(map_ax_error(err));
        }
        Ok(())
    }
}

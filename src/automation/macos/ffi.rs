//! Accessibility FFI declarations and RAII helpers
//!
//! Core Foundation types come from the `core-foundation` crate; the AX calls
//! live in ApplicationServices and have no crate binding we use.

use anyhow::{Result, bail};
use core_foundation::array::{CFArrayGetCount, CFArrayGetValueAtIndex, CFArrayRef};
use core_foundation::base::{CFGetTypeID, CFRelease, CFTypeRef, TCFType};
use core_foundation::boolean::CFBoolean;
use core_foundation::string::{CFString, CFStringRef};
use libc::c_void;
use std::ptr;

// ============================================================================
// Accessibility Framework
// ============================================================================

pub const K_AX_ERROR_SUCCESS: i32 = 0;
pub const K_AX_ERROR_API_DISABLED: i32 = -25211;

pub type AXUIElementRef = *mut c_void;

#[link(name = "ApplicationServices", kind = "framework")]
unsafe extern "C" {
    pub fn AXUIElementCreateApplication(pid: i32) -> AXUIElementRef;

    pub fn AXUIElementCreateSystemWide() -> AXUIElementRef;

    pub fn AXUIElementCopyAttributeValue(
        element: AXUIElementRef,
        attribute: CFStringRef,
        value: *mut CFTypeRef,
    ) -> i32;

    pub fn AXUIElementSetAttributeValue(
        element: AXUIElementRef,
        attribute: CFStringRef,
        value: CFTypeRef,
    ) -> i32;

    pub fn AXUIElementPerformAction(element: AXUIElementRef, action: CFStringRef) -> i32;

    pub fn AXIsProcessTrusted() -> bool;
}

// ============================================================================
// RAII Wrapper
// ============================================================================

/// Owned AXUIElementRef, released on drop
pub struct AXElement(AXUIElementRef);

impl AXElement {
    /// Take ownership of a +1 reference
    unsafe fn from_owned(raw: AXUIElementRef) -> Option<Self> {
        (!raw.is_null()).then_some(Self(raw))
    }

    pub fn application(pid: u32) -> Result<Self> {
        unsafe { Self::from_owned(AXUIElementCreateApplication(pid as i32)) }
            .ok_or_else(|| anyhow::anyhow!("Failed to create AX element for pid {}", pid))
    }

    pub fn system_wide() -> Result<Self> {
        unsafe { Self::from_owned(AXUIElementCreateSystemWide()) }
            .ok_or_else(|| anyhow::anyhow!("Failed to create system-wide AX element"))
    }

    /// Copy a raw attribute value; the caller owns the result
    fn copy_attribute(&self, name: &str) -> Result<CFTypeRef> {
        let attr = CFString::new(name);
        let mut value: CFTypeRef = ptr::null();
        let err = unsafe {
            AXUIElementCopyAttributeValue(self.0, attr.as_concrete_TypeRef(), &mut value)
        };
        if err == K_AX_ERROR_API_DISABLED {
            bail!(
                "Accessibility permissions not granted. \
                Enable in System Settings > Privacy & Security > Accessibility"
            );
        }
        if err != K_AX_ERROR_SUCCESS || value.is_null() {
            bail!("Failed to get attribute '{}' (AX error {})", name, err);
        }
        Ok(value)
    }

    pub fn element(&self, name: &str) -> Result<AXElement> {
        let value = self.copy_attribute(name)?;
        Ok(AXElement(value as AXUIElementRef))
    }

    pub fn string(&self, name: &str) -> Result<String> {
        let value = self.copy_attribute(name)?;
        unsafe {
            if CFGetTypeID(value) != CFString::type_id() {
                CFRelease(value);
                bail!("Attribute '{}' is not a string", name);
            }
            Ok(CFString::wrap_under_create_rule(value as CFStringRef).to_string())
        }
    }

    pub fn boolean(&self, name: &str) -> Result<bool> {
        let value = self.copy_attribute(name)?;
        unsafe {
            if CFGetTypeID(value) != CFBoolean::type_id() {
                CFRelease(value);
                bail!("Attribute '{}' is not a boolean", name);
            }
            Ok(CFBoolean::wrap_under_create_rule(value as _).into())
        }
    }

    pub fn set_boolean(&self, name: &str, value: bool) -> Result<()> {
        let attr = CFString::new(name);
        let flag = if value {
            CFBoolean::true_value()
        } else {
            CFBoolean::false_value()
        };
        let err = unsafe {
            AXUIElementSetAttributeValue(self.0, attr.as_concrete_TypeRef(), flag.as_CFTypeRef())
        };
        if err != K_AX_ERROR_SUCCESS {
            bail!("Failed to set '{}' (AX error {})", name, err);
        }
        Ok(())
    }

    pub fn perform(&self, action: &str) -> Result<()> {
        let name = CFString::new(action);
        let err = unsafe { AXUIElementPerformAction(self.0, name.as_concrete_TypeRef()) };
        if err != K_AX_ERROR_SUCCESS {
            bail!("Failed to perform '{}' (AX error {})", action, err);
        }
        Ok(())
    }

    /// Elements of an array-valued attribute such as `AXWindows`
    pub fn children(&self, name: &str) -> Result<Vec<AXElement>> {
        let value = self.copy_attribute(name)?;
        let array = value as CFArrayRef;
        let mut out = Vec::new();
        unsafe {
            for i in 0..CFArrayGetCount(array) {
                let item = CFArrayGetValueAtIndex(array, i) as AXUIElementRef;
                if item.is_null() {
                    continue;
                }
                // Array items are borrowed; retain so each one outlives the array
                core_foundation::base::CFRetain(item as CFTypeRef);
                out.push(AXElement(item));
            }
            CFRelease(value);
        }
        Ok(out)
    }
}

impl Drop for AXElement {
    fn drop(&mut self) {
        if !self.0.is_null() {
            unsafe { CFRelease(self.0 as CFTypeRef) };
        }
    }
}

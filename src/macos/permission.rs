//! Accessibility trust checks. Without AX trust every element call
//! answers APIDisabled, so the engine gates on this at startup and
//! re-probes after a runtime revocation.

use core_foundation::base::TCFType;
use core_foundation::boolean::CFBoolean;
use core_foundation::dictionary::{CFDictionary, CFDictionaryRef};
use core_foundation::string::CFString;

#[link(name = "ApplicationServices", kind = "framework")]
unsafe extern "C" {
    fn AXIsProcessTrusted() -> bool;
    fn AXIsProcessTrustedWithOptions(options: CFDictionaryRef) -> bool;
}

/// Non-prompting trust probe; safe to call from any thread.
pub fn is_trusted() -> bool {
    unsafe { AXIsProcessTrusted() }
}

/// Checks trust and, if missing, asks the OS to show the grant dialog.
pub fn check_and_prompt() -> bool {
    let key = CFString::from_static_string("AXTrustedCheckOptionPrompt");
    let options = CFDictionary::from_CFType_pairs(&[(
        key.as_CFType(),
        CFBoolean::true_value().as_CFType(),
    )]);
    unsafe { AXIsProcessTrustedWithOptions(options.as_concrete_TypeRef()) }
}

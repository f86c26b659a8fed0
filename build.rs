// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

fn main() {
    println!(r#"cargo:rustc-check-cfg=cfg(rtc_sched_has_native_rmw)"#);

    let target = std::env::var("TARGET").unwrap_or_default();
    match target.as_str() {
        "thumbv6m-none-eabi" => {
            // No atomic RMW on ARMv6-M; the swap polyfill masks interrupts
            // instead.
        }
        _ => {
            // Everything else we build for (ARMv7-M and up, RISC-V with the A
            // extension, and the host running unit tests) has native swap.
            println!("cargo:rustc-cfg=rtc_sched_has_native_rmw");
        }
    }
}

// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Service layer — bridges the command line to the sharespool backend crates.
//
// `AppServices` owns the persistent pieces (config, credential store, audit
// log) and plays the host print framework: it drives the controllers and
// drains their callback channel.

pub mod app_services;
pub mod data_dir;

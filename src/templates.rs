//! Starter files written by `devx project init` and `devx project gen`.

use crate::manifest::quote;

/// Package every new project depends on.
pub const BOOTSTRAP_PACKAGE: &str = "github.com/devopzilla/guku-devx@main/pkg/guku.io";

/// Default `cue.mod/module.cue` for a new project.
pub fn module_manifest(module: &str) -> String {
    format!(
        r#"module: {}
packages: [
	"{}",
]
"#,
        quote(module),
        BOOTSTRAP_PACKAGE
    )
}

pub const STACK_FILE: &str = "stack.cue";
pub const BUILDER_FILE: &str = "builder.cue";

pub const STACK: &str = r#"package main

import (
	"guku.io/devx/v1"
	"guku.io/devx/v1/traits"
)

stack: v1.#Stack & {
	components: {
		app: {
			v1.#Component
			traits.#Workload
			traits.#Exposable
			image: "app:v1"
			ports: [
				{
					port: 8080
				},
			]
			env: {
				PGDB_URL: db.url
			}
			volumes: [
				{
					source: "bla"
					target: "/tmp/bla"
				},
			]
		}
		db: {
			v1.#Component
			traits.#Postgres
			version:    "12.1"
			persistent: true
		}
	}
}
"#;

pub const BUILDER: &str = r#"package main

import (
	"guku.io/devx/v1"
	"guku.io/devx/v1/traits"
	"guku.io/devx/v1/transformers/compose"
)

builders: v1.#StackBuilder & {
	dev: {
		additionalComponents: {
			observedb: {
				v1.#Component
				traits.#Postgres
				version:    "12.1"
				persistent: true
			}
		}
		flows: [
			v1.#Flow & {
				pipeline: [
					compose.#AddComposeService & {},
				]
			},
			v1.#Flow & {
				pipeline: [
					compose.#AddComposePostgres & {},
				]
			},
		]
	}
}
"#;

/// Files written by `devx project gen`, as (file name, contents).
pub fn stack_files() -> [(&'static str, &'static str); 2] {
    [(STACK_FILE, STACK), (BUILDER_FILE, BUILDER)]
}

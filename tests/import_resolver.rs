// tests/import_resolver.rs

use std::path::{Path, PathBuf};

use edgewatch::errors::ErrorKind;
use edgewatch::fs::mock::MockFileSystem;
use edgewatch::watch::resolver::{
    DependencyEdge, ImportMap, ImportResolver, Syntax, find_import_map, scan_imports, scan_imports_as, strip_jsonc,
    to_local_path,
};

const ROOT: &str = "/proj";
const HELLO: &str = "/proj/supabase/functions/hello";

fn entry() -> PathBuf {
    Path::new(HELLO).join("index.ts")
}

#[test]
fn scans_every_import_form() {
    let src = r#"
import def from "./default.ts";
import { a, b as c } from './named.ts';
import * as ns from "./namespace.ts";
import type { T } from "./types.ts";
import "./side-effect.ts";
import {
  multi,
  line,
} from "./multi.ts";
export { x } from "./reexport.ts";
export * from "./star.ts";
const lazy = await import("./dynamic.ts");
// import "./line-comment.ts";
/* import "./block-comment.ts"; */
const url = "https://example.com/not-an-import.ts";
"#;

    assert_eq!(
        scan_imports(src),
        vec![
            "./default.ts",
            "./named.ts",
            "./namespace.ts",
            "./types.ts",
            "./side-effect.ts",
            "./multi.ts",
            "./reexport.ts",
            "./star.ts",
            "./dynamic.ts",
        ]
    );
}

#[test]
fn comment_markers_inside_strings_do_not_hide_imports() {
    let src = r#"const pattern = "dist/*";
import { x } from "./x.ts";
const cdn = 'https://esm.sh/*react';
export { y } from "./y.ts";
/** docs */
import("./z.ts");
"#;

    assert_eq!(scan_imports(src), vec!["./x.ts", "./y.ts", "./z.ts"]);
}

#[test]
fn trailing_comments_do_not_add_imports() {
    let src = r#"import { a } from "./a.ts"; // import "./old.ts";
const s = "import './in-string.ts'"; /* import "./gone.ts"; */
const t = `import("./template.ts")`;
"#;

    assert_eq!(scan_imports(src), vec!["./a.ts"]);
}

#[test]
fn jsx_sources_use_the_jsx_grammar() {
    let src = r#"import { Button } from "./button.tsx";
export const App = () => <Button label="import('./nope.ts')" />;
"#;

    assert_eq!(Syntax::for_path(Path::new("/x/app.tsx")), Syntax::Tsx);
    assert_eq!(Syntax::for_path(Path::new("/x/app.jsx")), Syntax::Tsx);
    assert_eq!(Syntax::for_path(Path::new("/x/index.ts")), Syntax::TypeScript);
    assert_eq!(Syntax::for_path(Path::new("/x/mod.js")), Syntax::TypeScript);
    assert_eq!(scan_imports_as(Syntax::Tsx, src), vec!["./button.tsx"]);
}

#[test]
fn imports_after_glob_like_strings_are_followed() {
    let fs = MockFileSystem::new();
    fs.add_file(
        entry(),
        r#"const u = "https://cdn.example/*";
import { y } from "../../../shared/y.ts";
/** doc */
export default y;
"#,
    );
    fs.add_file("/proj/shared/y.ts", "export const y = 1;");

    let res = ImportResolver::new(&fs, Path::new(ROOT)).walk(&entry(), None);

    assert!(res.errors.is_empty());
    assert!(res.graph.contains(Path::new("/proj/shared/y.ts")));
}

#[test]
fn only_local_specifiers_become_paths() {
    let base = Path::new("/proj/fn");
    assert_eq!(to_local_path("./a.ts", base), Some(PathBuf::from("/proj/fn/a.ts")));
    assert_eq!(to_local_path("../shared/b.ts", base), Some(PathBuf::from("/proj/shared/b.ts")));
    assert_eq!(to_local_path("/abs/c.ts", base), Some(PathBuf::from("/abs/c.ts")));
    assert_eq!(to_local_path("file:///abs/d.ts", base), Some(PathBuf::from("/abs/d.ts")));

    for remote in [
        "https://deno.land/std/http/server.ts",
        "http://x/y.ts",
        "npm:zod",
        "jsr:@std/path",
        "node:fs",
        "data:text/javascript,1",
        "lodash",
    ] {
        assert_eq!(to_local_path(remote, base), None, "{remote}");
    }
}

#[test]
fn follows_transitive_imports_outside_functions_root() {
    let fs = MockFileSystem::new();
    fs.add_file(entry(), r#"import { db } from "../../../shared/db.ts";"#);
    fs.add_file("/proj/shared/db.ts", r#"import "./pool.ts"; import "npm:postgres";"#);
    fs.add_file("/proj/shared/pool.ts", "export const pool = 1;");

    let res = ImportResolver::new(&fs, Path::new(ROOT)).walk(&entry(), None);

    assert!(res.errors.is_empty());
    assert_eq!(res.graph.len(), 3);
    assert!(res.graph.contains(Path::new("/proj/shared/pool.ts")));
    assert_eq!(
        res.graph.edges(),
        vec![
            DependencyEdge {
                source: PathBuf::from("/proj/shared/db.ts"),
                imported: PathBuf::from("/proj/shared/pool.ts"),
            },
            DependencyEdge {
                source: entry(),
                imported: PathBuf::from("/proj/shared/db.ts"),
            },
        ]
    );
}

#[test]
fn cycles_terminate() {
    let fs = MockFileSystem::new();
    fs.add_file(entry(), r#"import "./a.ts";"#);
    fs.add_file(format!("{HELLO}/a.ts"), r#"import "./b.ts";"#);
    fs.add_file(format!("{HELLO}/b.ts"), r#"import "./a.ts"; import "./index.ts";"#);

    let res = ImportResolver::new(&fs, Path::new(ROOT)).walk(&entry(), None);

    assert_eq!(res.graph.len(), 3);
    assert_eq!(res.graph.edges().len(), 4);
}

#[test]
fn missing_imports_are_skipped_silently() {
    let fs = MockFileSystem::new();
    fs.add_file(entry(), r#"import "./gone.ts"; import "./here.ts";"#);
    fs.add_file(format!("{HELLO}/here.ts"), "");

    let res = ImportResolver::new(&fs, Path::new(ROOT)).walk(&entry(), None);

    assert!(res.errors.is_empty());
    assert_eq!(res.graph.len(), 2);
    assert!(!res.graph.contains(&Path::new(HELLO).join("gone.ts")));
}

#[test]
fn missing_entrypoint_is_a_resolver_error() {
    let fs = MockFileSystem::new();
    fs.add_dir(HELLO);

    let res = ImportResolver::new(&fs, Path::new(ROOT)).walk(&entry(), None);

    assert!(res.graph.is_empty());
    assert_eq!(res.errors.len(), 1);
    assert_eq!(res.errors[0].kind(), ErrorKind::Resolver);
}

#[test]
fn import_map_exact_and_longest_prefix() {
    let fs = MockFileSystem::new();
    fs.add_file(
        format!("{HELLO}/deno.json"),
        r#"{
            "imports": {
                "db": "../../../shared/db.ts",
                "@lib/": "../../../lib/",
                "@lib/special/": "../../../special/",
                "zod": "npm:zod"
            }
        }"#,
    );
    fs.add_file(
        entry(),
        r#"
import "db";
import "@lib/util.ts";
import "@lib/special/x.ts";
import "zod";
"#,
    );
    fs.add_file("/proj/shared/db.ts", "");
    fs.add_file("/proj/lib/util.ts", "");
    fs.add_file("/proj/special/x.ts", "");

    let res = ImportResolver::new(&fs, Path::new(ROOT)).walk(&entry(), None);

    assert!(res.errors.is_empty());
    assert_eq!(res.manifests, vec![PathBuf::from(format!("{HELLO}/deno.json"))]);
    let files = res.files();
    for expected in [
        "/proj/shared/db.ts",
        "/proj/lib/util.ts",
        "/proj/special/x.ts",
        "/proj/supabase/functions/hello/deno.json",
    ] {
        assert!(files.contains(Path::new(expected)), "{expected} missing from {files:?}");
    }
    assert_eq!(files.len(), 5);
}

#[test]
fn manifest_lookup_precedence_and_root_bound() {
    let fs = MockFileSystem::new();
    fs.add_file("/deno.json", "{}");
    fs.add_file("/proj/supabase/functions/import_map.json", "{}");
    fs.add_dir(HELLO);

    // Walks up to the first manifest.
    assert_eq!(
        find_import_map(&fs, Path::new(HELLO), Path::new(ROOT)),
        Some(PathBuf::from("/proj/supabase/functions/import_map.json"))
    );

    // deno.json wins over import_map.json in the same directory.
    fs.add_file("/proj/supabase/functions/deno.json", "{}");
    assert_eq!(
        find_import_map(&fs, Path::new(HELLO), Path::new(ROOT)),
        Some(PathBuf::from("/proj/supabase/functions/deno.json"))
    );

    // Nothing above the project root is consulted.
    let fs = MockFileSystem::new();
    fs.add_file("/deno.json", "{}");
    fs.add_dir(HELLO);
    assert_eq!(find_import_map(&fs, Path::new(HELLO), Path::new(ROOT)), None);
}

#[test]
fn jsonc_manifest_accepts_comments_and_trailing_commas() {
    let fs = MockFileSystem::new();
    fs.add_file(
        format!("{HELLO}/deno.jsonc"),
        r#"{
            // shared helpers
            "imports": {
                "db": "https://example.com/db.ts", /* remote */
                "local": "./local.ts",
            },
        }"#,
    );

    let map = ImportMap::load(&fs, &Path::new(HELLO).join("deno.jsonc")).unwrap();
    assert_eq!(map.rewrite("local").as_deref(), Some("./local.ts"));
    assert_eq!(map.rewrite("db").as_deref(), Some("https://example.com/db.ts"));
    assert_eq!(map.rewrite("other"), None);
}

#[test]
fn strict_manifest_with_comments_is_reported_and_skipped() {
    let fs = MockFileSystem::new();
    fs.add_file(format!("{HELLO}/deno.json"), "{ // nope\n \"imports\": {} }");
    fs.add_file(entry(), r#"import "./a.ts";"#);
    fs.add_file(format!("{HELLO}/a.ts"), "");

    let res = ImportResolver::new(&fs, Path::new(ROOT)).walk(&entry(), None);

    assert_eq!(res.errors.len(), 1);
    assert_eq!(res.errors[0].kind(), ErrorKind::Resolver);
    // The walk still happens, and the broken manifest is still a dependency.
    assert_eq!(res.graph.len(), 2);
    assert_eq!(res.manifests, vec![PathBuf::from(format!("{HELLO}/deno.json"))]);
}

#[test]
fn deno_json_import_map_field_is_followed() {
    let fs = MockFileSystem::new();
    fs.add_file(format!("{HELLO}/deno.json"), r#"{ "importMap": "./maps/imports.json" }"#);
    fs.add_file(
        format!("{HELLO}/maps/imports.json"),
        r#"{ "imports": { "util": "../util.ts" } }"#,
    );
    fs.add_file(format!("{HELLO}/util.ts"), "");
    fs.add_file(entry(), r#"import { u } from "util";"#);

    let res = ImportResolver::new(&fs, Path::new(ROOT)).walk(&entry(), None);

    assert!(res.errors.is_empty());
    assert!(res.graph.contains(&Path::new(HELLO).join("util.ts")));
    assert_eq!(
        res.manifests,
        vec![
            PathBuf::from(format!("{HELLO}/deno.json")),
            PathBuf::from(format!("{HELLO}/maps/imports.json")),
        ]
    );
}

#[test]
fn explicit_import_map_overrides_lookup() {
    let fs = MockFileSystem::new();
    fs.add_file(format!("{HELLO}/deno.json"), r#"{ "imports": { "x": "./wrong.ts" } }"#);
    fs.add_file("/proj/maps/custom.json", r#"{ "imports": { "x": "../shared/right.ts" } }"#);
    fs.add_file("/proj/shared/right.ts", "");
    fs.add_file(format!("{HELLO}/wrong.ts"), "");
    fs.add_file(entry(), r#"import "x";"#);

    let res = ImportResolver::new(&fs, Path::new(ROOT))
        .walk(&entry(), Some(Path::new("/proj/maps/custom.json")));

    assert!(res.graph.contains(Path::new("/proj/shared/right.ts")));
    assert!(!res.graph.contains(&Path::new(HELLO).join("wrong.ts")));
}

#[test]
fn jsonc_stripping_keeps_string_contents() {
    let stripped = strip_jsonc(r#"{ "a": "http://x//y", /* c */ "b": "/*not*/", }"#);
    let value: serde_json::Value = serde_json::from_str(&stripped).unwrap();
    assert_eq!(value["a"], "http://x//y");
    assert_eq!(value["b"], "/*not*/");
}

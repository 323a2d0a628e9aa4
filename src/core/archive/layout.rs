// ─── Bundle Layout ───
// Entry names of the portable zip bundle. Changing any of these breaks
// bundles written by earlier builds.

/// Original manifest text, byte for byte.
pub const RESOURCE_MANIFEST: &str = "resource-manifest";
/// Manifest synthesized from an index entry.
pub const RESOURCE_MANIFEST_JSON: &str = "resource-manifest.json";
/// Prefix of content-addressed payload entries: `files/<sha1>`.
pub const FILES_PREFIX: &str = "files/";
/// Array of stubs for loose files exported alongside a version.
pub const LOCAL_RESOURCES: &str = "local-resources.json";
/// Single stub for one exported unidentified file.
pub const LOCAL_RESOURCE: &str = "local-resource.json";
/// Folder name of an exported world, as plain text.
pub const WORLD_MANIFEST: &str = "world-manifest";
/// Prefix of world contents.
pub const WORLD_PREFIX: &str = "world/";
pub const INSTALL_PAGE: &str = "HOW TO INSTALL.html";

pub const INSTALL_PAGE_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8">
  <meta name="viewport" content="width=device-width, initial-scale=1, maximum-scale=1, user-scalable=no">
  <meta http-equiv="X-UA-Compatible" content="ie=edge">
  <meta name="renderer" content="webkit">
  <meta http-equiv="Cache-Control" content="no-siteapp" />
  <title>PureLauncher | Redirect</title>
</head>
<body>
  Redirecting...
  <script>location.href='https://pl.apisium.cn/redirect.html'</script>
</body>
</html>
"#;

pub fn payload_entry(hash: &str) -> String {
    format!("{}{}", FILES_PREFIX, hash)
}

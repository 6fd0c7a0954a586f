// Copyright (c) 2026 rezky_nightky

//! GLSL sources for every pass. The `#pragma vertex` / `#pragma kernel`
//! lines name the stage the software context runs for each program; a GL
//! driver ignores them.

pub const GLYPH_VS: &str = r#"
#version 330
#pragma vertex glyph

uniform float uScreenWidth;
uniform float uScreenHeight;

layout(location = 0) in vec2 aPosition;
layout(location = 1) in vec2 aUv;
layout(location = 2) in vec4 aColor;

smooth out vec2 fUv;
flat out vec4 fColor;

void main() {
  vec2 ndcPos;
  ndcPos.x = (aPosition.x / uScreenWidth) * 2.0 - 1.0;
  ndcPos.y = (aPosition.y / uScreenHeight) * -2.0 + 1.0;

  gl_Position = vec4(ndcPos, 0.0, 1.0);
  fUv = aUv;
  fColor = aColor;
}
"#;

pub const GLYPH_FS: &str = r#"
#version 330
#pragma kernel glyph

uniform sampler2D uFont;

smooth in vec2 fUv;
flat in vec4 fColor;

out vec4 oColor;

void main() {
  float mask = texture(uFont, fUv).r;
  oColor = vec4(fColor.rgb, fColor.a * mask);
}
"#;

pub const FULLSCREEN_VS: &str = r#"
#version 330
#pragma vertex fullscreen

layout(location = 0) in vec2 aUv;

smooth out vec2 fUv;

void main() {
  gl_Position = vec4(aUv * 2.0 - 1.0, 0.0, 1.0);
  fUv = aUv;
}
"#;

pub const COPY_FS: &str = r#"
#version 330
#pragma kernel copy

uniform sampler2D uTexture;

smooth in vec2 fUv;

out vec4 oColor;

void main() {
  oColor = texture(uTexture, fUv);
}
"#;

pub const BLUR_FS: &str = r#"
#version 330
#if defined(HORIZONTAL)
#pragma kernel blur_horizontal
#elif defined(VERTICAL)
#pragma kernel blur_vertical
#else
#error "blur direction must be HORIZONTAL or VERTICAL"
#endif

uniform sampler2D uTexture;
uniform float uStrength;

smooth in vec2 fUv;

out vec4 oColor;

const float KERNEL[3] = float[] (0.25, 0.5, 0.25);

void main() {
  vec2 step = 1.0 / vec2(textureSize(uTexture, 0));
  vec3 color = vec3(0.0);

  for (int i = 0; i < 3; ++i) {
#if defined(HORIZONTAL)
    color += texture(uTexture, fUv + vec2(i - 1, 0.0) * step).rgb * KERNEL[i];
#else
    color += texture(uTexture, fUv + vec2(0.0, i - 1) * step).rgb * KERNEL[i];
#endif
  }

  oColor = vec4(mix(texture(uTexture, fUv).rgb, color, uStrength), 1.0);
}
"#;

pub const BLOOM_PREFILTER_FS: &str = r#"
#version 330
#pragma kernel bloom_prefilter

uniform sampler2D uSource;
uniform float uThreshold;
uniform float uKnee;

in vec2 fUv;

out vec4 oColor;

void main() {
  vec3 color = texture(uSource, fUv).rgb;
  float luma = dot(vec3(0.299, 0.587, 0.114), color);
  oColor = vec4(smoothstep(uThreshold - uKnee, uThreshold + uKnee, luma) * color, 1.0);
}
"#;

pub const BLOOM_DOWNSAMPLE_FS: &str = r#"
#version 330
#pragma kernel bloom_downsample

uniform sampler2D uSource;

in vec2 fUv;

out vec4 oColor;

void main() {
  vec2 s = 1.0 / vec2(textureSize(uSource, 0));

  vec3 tl = texture(uSource, fUv + vec2(-s.x, +s.y)).rgb;
  vec3 tr = texture(uSource, fUv + vec2(+s.x, +s.y)).rgb;
  vec3 bl = texture(uSource, fUv + vec2(-s.x, -s.y)).rgb;
  vec3 br = texture(uSource, fUv + vec2(+s.x, -s.y)).rgb;

  oColor = vec4((tl + tr + bl + br) / 4.0, 1.0);
}
"#;

pub const BLOOM_UPSAMPLE_FS: &str = r#"
#version 330
#pragma kernel bloom_upsample

uniform sampler2D uPrevious;
uniform sampler2D uDownsample;

in vec2 fUv;

out vec4 oColor;

void main() {
  vec2 s = 1.0 / vec2(textureSize(uPrevious, 0));

  vec3 up = vec3(0.0);
  up += 1.0 * texture(uPrevious, fUv + vec2(-s.x, +s.y)).rgb;
  up += 2.0 * texture(uPrevious, fUv + vec2(+0.0, +s.y)).rgb;
  up += 1.0 * texture(uPrevious, fUv + vec2(+s.x, +s.y)).rgb;
  up += 2.0 * texture(uPrevious, fUv + vec2(-s.x, +0.0)).rgb;
  up += 4.0 * texture(uPrevious, fUv + vec2(+0.0, +0.0)).rgb;
  up += 2.0 * texture(uPrevious, fUv + vec2(+s.x, +0.0)).rgb;
  up += 1.0 * texture(uPrevious, fUv + vec2(-s.x, -s.y)).rgb;
  up += 2.0 * texture(uPrevious, fUv + vec2(+0.0, -s.y)).rgb;
  up += 1.0 * texture(uPrevious, fUv + vec2(+s.x, -s.y)).rgb;

  oColor = vec4(up / 16.0 + texture(uDownsample, fUv).rgb, 1.0);
}
"#;

pub const TONEMAP_FS: &str = r#"
#version 330
#pragma kernel tonemap

uniform sampler2D uBase;
uniform sampler2D uBloom;
uniform float uExposure;
uniform float uBloomIntensity;

in vec2 fUv;

out vec4 oColor;

void main() {
  vec3 hdr = texture(uBase, fUv).rgb + texture(uBloom, fUv).rgb * uBloomIntensity;
  oColor = vec4(vec3(1.0) - exp(-hdr * uExposure), 1.0);
}
"#;

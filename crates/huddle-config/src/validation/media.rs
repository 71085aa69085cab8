use crate::schema::HuddleConfig;

/// Each minimum must be non-zero and no larger than its ideal.
pub(crate) fn validate_video(errors: &mut Vec<String>, config: &HuddleConfig) {
    let v = &config.media.video;
    let pairs = [
        ("width", v.min_width, v.ideal_width),
        ("height", v.min_height, v.ideal_height),
        ("frame_rate", v.min_frame_rate, v.ideal_frame_rate),
    ];
    for (name, min, ideal) in pairs {
        if min == 0 {
            errors.push(format!("media.video.min_{name} must be greater than 0"));
        }
        if min > ideal {
            errors.push(format!(
                "media.video.min_{name} = {min} exceeds media.video.ideal_{name} = {ideal}"
            ));
        }
    }
}

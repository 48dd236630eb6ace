use poise::serenity_prelude as serenity;

/// Effective guild-level permissions of `user_id`: the union of `@everyone`
/// and every role the member holds. The guild owner holds everything.
pub async fn guild_permissions(
    http: &serenity::Http,
    guild_id: serenity::GuildId,
    user_id: serenity::UserId,
) -> anyhow::Result<serenity::Permissions> {
    let guild = guild_id.to_partial_guild(http).await?;
    if guild.owner_id == user_id {
        return Ok(serenity::Permissions::all());
    }

    let member = guild_id.member(http, user_id).await?;
    let everyone = serenity::RoleId::new(guild_id.get());

    let permissions = guild
        .roles
        .values()
        .filter(|role| role.id == everyone || member.roles.contains(&role.id))
        .fold(serenity::Permissions::empty(), |acc, role| {
            acc | role.permissions
        });

    Ok(permissions)
}

/// Administrators pass every check.
pub async fn has_permission(
    http: &serenity::Http,
    guild_id: serenity::GuildId,
    user_id: serenity::UserId,
    required: serenity::Permissions,
) -> anyhow::Result<bool> {
    let permissions = guild_permissions(http, guild_id, user_id).await?;
    Ok(permissions.administrator() || permissions.contains(required))
}
